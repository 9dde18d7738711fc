use super::{Formatted, Processor, ProcessingError};
use crate::state::ContentKind;
use once_cell::sync::Lazy;
use regex::Regex;

static HTML_COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("Invalid HTML comment regex"));
static BETWEEN_TAGS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r">\s+<").expect("Invalid between-tags regex"));
static TAG_BOUNDARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r">\s*<").expect("Invalid tag boundary regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));
static CSS_COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("Invalid CSS comment regex"));
static CSS_PUNCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*([{}:;,>])\s*").expect("Invalid CSS punctuation regex"));
static TAG_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<([a-zA-Z][a-zA-Z0-9-]*)").expect("Invalid tag name regex"));

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr", "!doctype",
];

/// Regex/scanner based formatter for HTML, CSS and JavaScript
///
/// Not a parser: output is meant for reading and diffing, not for serving.
#[derive(Debug, Clone)]
pub struct BasicFormatter {
    indent: String,
}

impl Default for BasicFormatter {
    fn default() -> Self {
        Self::new(2)
    }
}

impl BasicFormatter {
    pub fn new(indent_width: usize) -> Self {
        Self {
            indent: " ".repeat(indent_width),
        }
    }

    pub fn beautify_html(&self, source: &str) -> String {
        let split = TAG_BOUNDARY_RE.replace_all(source.trim(), ">\n<");
        let mut out = String::with_capacity(split.len());
        let mut depth = 0usize;

        for line in split.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if line.starts_with("</") {
                depth = depth.saturating_sub(1);
            }
            out.push_str(&self.indent.repeat(depth));
            out.push_str(line);
            out.push('\n');

            if opens_block(line) {
                depth += 1;
            }
        }
        out
    }

    pub fn minify_html(&self, source: &str) -> String {
        let without_comments = HTML_COMMENT_RE.replace_all(source, "");
        let collapsed = WHITESPACE_RE.replace_all(&without_comments, " ");
        BETWEEN_TAGS_RE
            .replace_all(&collapsed, "><")
            .trim()
            .to_string()
    }

    pub fn minify_css(&self, source: &str) -> String {
        let without_comments = CSS_COMMENT_RE.replace_all(source, "");
        let collapsed = WHITESPACE_RE.replace_all(&without_comments, " ");
        CSS_PUNCT_RE
            .replace_all(&collapsed, "$1")
            .replace(";}", "}")
            .trim()
            .to_string()
    }

    pub fn beautify_css(&self, source: &str) -> String {
        let compact = self.minify_css(source);
        let mut out = String::with_capacity(compact.len() * 2);
        let mut depth = 0usize;
        let mut line = String::new();

        let flush = |out: &mut String, line: &mut String, depth: usize, indent: &str| {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                out.push_str(&indent.repeat(depth));
                out.push_str(trimmed);
                out.push('\n');
            }
            line.clear();
        };

        for c in compact.chars() {
            match c {
                '{' => {
                    line.push_str(" {");
                    flush(&mut out, &mut line, depth, &self.indent);
                    depth += 1;
                }
                ';' => {
                    line.push(';');
                    flush(&mut out, &mut line, depth, &self.indent);
                }
                '}' => {
                    if !line.trim().is_empty() {
                        line.push(';');
                    }
                    flush(&mut out, &mut line, depth, &self.indent);
                    depth = depth.saturating_sub(1);
                    line.push('}');
                    flush(&mut out, &mut line, depth, &self.indent);
                }
                ':' if depth > 0 => line.push_str(": "),
                _ => line.push(c),
            }
        }
        flush(&mut out, &mut line, depth, &self.indent);
        out
    }

    /// Drops comments, trims lines and removes blank lines
    ///
    /// Line breaks are kept so automatic semicolon insertion is unaffected.
    pub fn minify_js(&self, source: &str) -> String {
        strip_js_comments(source)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Re-indents by brace depth, breaking after `{`, `;` and `}` outside
    /// strings, comments and parentheses
    pub fn beautify_js(&self, source: &str) -> String {
        let code = self.minify_js(source);
        let mut out = String::with_capacity(code.len() * 2);
        let mut line = String::new();
        let mut depth = 0usize;
        let mut parens = 0usize;
        let mut quote: Option<char> = None;
        let mut escaped = false;

        let flush = |out: &mut String, line: &mut String, depth: usize, indent: &str| {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                out.push_str(&indent.repeat(depth));
                out.push_str(trimmed);
                out.push('\n');
            }
            line.clear();
        };

        let mut chars = code.chars().peekable();
        while let Some(c) = chars.next() {
            if let Some(q) = quote {
                line.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                continue;
            }

            match c {
                '"' | '\'' | '`' => {
                    quote = Some(c);
                    line.push(c);
                }
                '(' | '[' => {
                    parens += 1;
                    line.push(c);
                }
                ')' | ']' => {
                    parens = parens.saturating_sub(1);
                    line.push(c);
                }
                '{' => {
                    line.push(c);
                    flush(&mut out, &mut line, depth, &self.indent);
                    depth += 1;
                }
                '}' => {
                    flush(&mut out, &mut line, depth, &self.indent);
                    depth = depth.saturating_sub(1);
                    line.push(c);
                    // `});`, `},` and `}.then(` stay on the brace's line
                    if !matches!(chars.peek(), Some(';' | ',' | ')' | '.')) {
                        flush(&mut out, &mut line, depth, &self.indent);
                    }
                }
                ';' if parens == 0 => {
                    line.push(c);
                    flush(&mut out, &mut line, depth, &self.indent);
                }
                '\n' => flush(&mut out, &mut line, depth, &self.indent),
                _ => line.push(c),
            }
        }
        flush(&mut out, &mut line, depth, &self.indent);
        out
    }

    /// Beautifies after decoding hex and unicode escapes in string literals
    pub fn deobfuscate_js(&self, source: &str) -> String {
        self.beautify_js(&unescape_js_strings(&strip_js_comments(source)))
    }
}

impl Processor for BasicFormatter {
    fn name(&self) -> &str {
        "basic-formatter"
    }

    fn process(&self, source: &str, kind: ContentKind) -> Result<Formatted, ProcessingError> {
        let formatted = match kind {
            ContentKind::Page => {
                let beautified = self.beautify_html(source);
                Formatted {
                    deobfuscated: beautified.clone(),
                    minified: self.minify_html(source),
                    beautified,
                }
            }
            ContentKind::Stylesheet => {
                let beautified = self.beautify_css(source);
                Formatted {
                    deobfuscated: beautified.clone(),
                    minified: self.minify_css(source),
                    beautified,
                }
            }
            ContentKind::Script => Formatted {
                beautified: self.beautify_js(source),
                minified: self.minify_js(source),
                deobfuscated: self.deobfuscate_js(source),
            },
            other => return Err(ProcessingError::Unsupported(other)),
        };
        Ok(formatted)
    }
}

/// True for a line that opens an element left open on the same line
fn opens_block(line: &str) -> bool {
    let Some(caps) = TAG_NAME_RE.captures(line) else {
        return false;
    };
    let name = caps[1].to_ascii_lowercase();
    if VOID_ELEMENTS.contains(&name.as_str()) || line.ends_with("/>") {
        return false;
    }
    !line.contains(&format!("</{}", name))
}

/// Removes `//` and `/* */` comments outside string literals
fn strip_js_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"' | '\'' | '`', _) => {
                quote = Some(c);
                out.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    if next == '\n' {
                        out.push('\n');
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Decodes `\xNN`, `\uNNNN` and `\u{...}` escapes inside string literals
///
/// An escape that decodes to the literal's quote, a backslash or a control
/// character is kept as written.
fn unescape_js_strings(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let Some(q) = quote else {
            if matches!(c, '"' | '\'' | '`') {
                quote = Some(c);
            }
            out.push(c);
            i += 1;
            continue;
        };

        if c == '\\' {
            if let Some((decoded, len)) = decode_escape(&chars[i + 1..]) {
                let unsafe_in_literal = decoded == q
                    || decoded == '\\'
                    || decoded.is_control()
                    || (q == '`' && decoded == '$');
                if !unsafe_in_literal {
                    out.push(decoded);
                    i += 1 + len;
                    continue;
                }
            }
            out.push(c);
            if let Some(&next) = chars.get(i + 1) {
                out.push(next);
            }
            i += 2;
            continue;
        }

        if c == q {
            quote = None;
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Decodes the escape following a backslash
///
/// Returns the character and the number of source characters consumed.
fn decode_escape(rest: &[char]) -> Option<(char, usize)> {
    let hex = |digits: &[char]| -> Option<u32> {
        if digits.is_empty() || !digits.iter().all(char::is_ascii_hexdigit) {
            return None;
        }
        u32::from_str_radix(&digits.iter().collect::<String>(), 16).ok()
    };

    match rest.first()? {
        'x' => Some((char::from_u32(hex(rest.get(1..3)?)?)?, 3)),
        'u' if rest.get(1) == Some(&'{') => {
            let close = rest.iter().position(|&c| c == '}')?;
            Some((char::from_u32(hex(&rest[2..close])?)?, close + 1))
        }
        'u' => Some((char::from_u32(hex(rest.get(1..5)?)?)?, 5)),
        _ => None,
    }
}
