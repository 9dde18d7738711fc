use crate::mirror::layout::{
    browsable_path, categorized_path, relative_path, short_hash, shortened_paths, with_stem_suffix,
};
use crate::state::ContentKind;
use crate::MirrorError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use url::Url;

/// Where a resource was stored, relative to the run directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    /// Categorized, byte-exact copy: `<host>/<kind-dir>/<path>`
    pub local_path: PathBuf,

    /// Browsable copy: `src/<host>/<path>`
    pub src_path: PathBuf,
}

/// Paths already handed out in this run, keyed by the browsable path
///
/// The browsable tree is not split by kind, so uniqueness there implies
/// uniqueness of the categorized paths as well.
#[derive(Debug, Default)]
struct PathRegistry {
    claimed: HashMap<PathBuf, String>,
}

impl PathRegistry {
    /// Reserves a relative path for `url`, disambiguating collisions
    fn claim(&mut self, url: &Url, kind: ContentKind) -> PathBuf {
        let mut relative = relative_path(url, kind);
        let key = url.as_str().to_string();

        let mut attempt = 0u32;
        loop {
            let src = browsable_path(url, &relative);
            match self.claimed.get(&src) {
                None => {
                    self.claimed.insert(src, key);
                    return relative;
                }
                Some(owner) if *owner == key => return relative,
                Some(owner) => {
                    tracing::debug!("Mirror path {:?} already used by {}", src, owner);
                    let salt = if attempt == 0 {
                        key.clone()
                    } else {
                        format!("{}#{}", key, attempt)
                    };
                    relative = with_stem_suffix(&relative_path(url, kind), &short_hash(&salt));
                    attempt += 1;
                }
            }
        }
    }
}

/// Writes fetched resources into the run directory
///
/// All writes are atomic (temp file in the target directory, then rename) and
/// run on the blocking thread pool.
#[derive(Debug)]
pub struct MirrorWriter {
    run_dir: PathBuf,
    registry: Mutex<PathRegistry>,
}

impl MirrorWriter {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
            registry: Mutex::new(PathRegistry::default()),
        }
    }

    /// Stores a resource in both mirror trees
    ///
    /// # Arguments
    ///
    /// * `url` - Final URL of the resource (after redirects)
    /// * `kind` - Detected content kind
    /// * `bytes` - Body, written byte-exact
    ///
    /// # Errors
    ///
    /// If the regular path cannot be written the write is retried once with a
    /// shortened hashed path; if that fails too `MirrorError::WriteFailed` is
    /// returned.
    pub async fn write(
        &self,
        url: &Url,
        kind: ContentKind,
        bytes: Arc<Vec<u8>>,
    ) -> Result<WrittenFile, MirrorError> {
        let relative = self.registry.lock().claim(url, kind);
        let primary = WrittenFile {
            local_path: categorized_path(url, kind, &relative),
            src_path: browsable_path(url, &relative),
        };

        match self.write_both(&primary, Arc::clone(&bytes)).await {
            Ok(()) => return Ok(primary),
            Err(e) => {
                tracing::warn!(
                    "Failed to write {} to {:?}: {}; retrying with shortened path",
                    url,
                    primary.local_path,
                    e
                );
            }
        }

        let (local_path, src_path) = shortened_paths(url, kind);
        let fallback = WrittenFile {
            local_path,
            src_path,
        };
        self.write_both(&fallback, bytes)
            .await
            .map_err(|source| MirrorError::WriteFailed {
                url: url.to_string(),
                source,
            })?;
        Ok(fallback)
    }

    async fn write_both(&self, target: &WrittenFile, bytes: Arc<Vec<u8>>) -> io::Result<()> {
        let local = self.run_dir.join(&target.local_path);
        let src = self.run_dir.join(&target.src_path);

        tokio::task::spawn_blocking(move || -> io::Result<()> {
            write_atomic(&local, &bytes)?;
            write_atomic(&src, &bytes)
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }
}

/// Writes `bytes` to `path` through a temp file in the same directory
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    std::fs::create_dir_all(parent)?;

    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(bytes)?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_write_both_copies() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MirrorWriter::new(dir.path());

        let written = writer
            .write(
                &url("https://example.com/css/site.css"),
                ContentKind::Stylesheet,
                Arc::new(b"body{}".to_vec()),
            )
            .await
            .unwrap();

        assert_eq!(
            written.local_path,
            Path::new("example.com/css/css/site.css")
        );
        assert_eq!(written.src_path, Path::new("src/example.com/css/site.css"));
        assert_eq!(
            std::fs::read(dir.path().join(&written.local_path)).unwrap(),
            b"body{}"
        );
        assert_eq!(
            std::fs::read(dir.path().join(&written.src_path)).unwrap(),
            b"body{}"
        );
    }

    #[tokio::test]
    async fn test_colliding_urls_get_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MirrorWriter::new(dir.path());

        // Both map to about/index.html
        let a = writer
            .write(
                &url("https://example.com/about"),
                ContentKind::Page,
                Arc::new(b"a".to_vec()),
            )
            .await
            .unwrap();
        let b = writer
            .write(
                &url("https://example.com/about/"),
                ContentKind::Page,
                Arc::new(b"b".to_vec()),
            )
            .await
            .unwrap();

        assert_ne!(a.local_path, b.local_path);
        assert_eq!(std::fs::read(dir.path().join(&a.local_path)).unwrap(), b"a");
        assert_eq!(std::fs::read(dir.path().join(&b.local_path)).unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_same_url_keeps_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MirrorWriter::new(dir.path());
        let u = url("https://example.com/a.js");

        let first = writer
            .write(&u, ContentKind::Script, Arc::new(b"1".to_vec()))
            .await
            .unwrap();
        let second = writer
            .write(&u, ContentKind::Script, Arc::new(b"2".to_vec()))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_falls_back_to_shortened_path() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MirrorWriter::new(dir.path());

        // A file where the page's directory would go forces the fallback
        writer
            .write(
                &url("https://example.com/x.png"),
                ContentKind::Image,
                Arc::new(b"img".to_vec()),
            )
            .await
            .unwrap();
        let nested = writer
            .write(
                &url("https://example.com/x.png/y.png"),
                ContentKind::Image,
                Arc::new(b"nested".to_vec()),
            )
            .await
            .unwrap();

        assert!(nested
            .local_path
            .starts_with(Path::new("example.com/img/_long")));
        assert_eq!(
            std::fs::read(dir.path().join(&nested.local_path)).unwrap(),
            b"nested"
        );
    }

    #[tokio::test]
    async fn test_unwritable_run_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();
        let writer = MirrorWriter::new(&file);

        let result = writer
            .write(
                &url("https://example.com/"),
                ContentKind::Page,
                Arc::new(b"x".to_vec()),
            )
            .await;
        assert!(matches!(result, Err(MirrorError::WriteFailed { .. })));
    }

    #[test]
    fn test_write_atomic_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep/nested/file.txt");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
    }
}
