//! Default values for configuration

/// Default maximum link depth from the seed page
pub fn default_max_depth() -> u32 {
    2
}

/// Default number of fetch attempts per resource
pub fn default_max_retries() -> u32 {
    3
}

/// Default number of concurrent workers
pub fn default_max_concurrency() -> u32 {
    8
}

/// Default per-request timeout (seconds)
pub fn default_request_timeout_secs() -> u64 {
    30
}

/// Default connect timeout (seconds)
pub fn default_connect_timeout_secs() -> u64 {
    10
}

/// Default response body cap: 50 MiB
pub fn default_max_body_bytes() -> u64 {
    50 * 1024 * 1024
}

/// Default first backoff delay (milliseconds)
pub fn default_base_delay_ms() -> u64 {
    500
}

/// Default backoff ceiling (milliseconds)
pub fn default_max_delay_ms() -> u64 {
    10_000
}

/// Default upper bound of random jitter added to each backoff (milliseconds)
pub fn default_jitter_ms() -> u64 {
    250
}

pub fn default_crawler_name() -> String {
    "site-mirror".to_string()
}

pub fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Default output root; each run gets a timestamped directory below it
pub fn default_output_root() -> String {
    "downloaded_site".to_string()
}

pub fn default_true() -> bool {
    true
}
