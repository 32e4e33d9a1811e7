//! Zero-context unified diff parser
//!
//! Turns `git diff --unified=0` output into per-file changed line ranges.

use crate::config::has_suffix;
use crate::error::ErrorKind;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

// +++ "b/c-quoted path" or +++ b/path, optionally followed by a tab
static FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\+\+\+ (?:"b/((?:[^"\\]|\\.)+)"|b/([^\t]+))(?:\t.*)?$"#)
        .expect("file marker regex")
});

// @@ -old[,count] +new[,count] @@
static HUNK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,(\d+))? @@").expect("hunk header regex")
});

/// Inclusive, 1-based block of lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    /// A valid range, or None if either bound is 0 or the bounds are reversed
    pub fn new(start: usize, end: usize) -> Option<Self> {
        let range = Self { start, end };
        range.is_valid().then_some(range)
    }

    pub fn is_valid(&self) -> bool {
        self.start >= 1 && self.end >= 1 && self.start <= self.end
    }

    /// Range for a hunk starting at `start` spanning `count` lines.
    /// An omitted count means one line; a zero count (pure deletion) has no range.
    pub fn from_hunk(start: usize, count: Option<usize>) -> Option<Self> {
        match count {
            None => Self::new(start, start),
            Some(0) => None,
            Some(n) => Self::new(start, start.checked_add(n - 1)?),
        }
    }
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// A file to process, optionally restricted to some lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkTarget {
    pub path: PathBuf,
    /// `None` means the whole file; `Some(empty)` means touched but nothing to format
    pub ranges: Option<Vec<LineRange>>,
}

impl HunkTarget {
    pub fn whole_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ranges: None,
        }
    }

    pub fn with_ranges(path: impl Into<PathBuf>, ranges: Vec<LineRange>) -> Self {
        Self {
            path: path.into(),
            ranges: Some(ranges),
        }
    }
}

/// Undo git's C-style quoting of a path: backslash escapes and `\NNN` octal bytes
fn unquote_path(quoted: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(quoted.len());
    let mut iter = quoted.bytes();

    while let Some(b) = iter.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        let escaped = match iter.next()? {
            b'a' => 0x07,
            b'b' => 0x08,
            b't' => b'\t',
            b'n' => b'\n',
            b'v' => 0x0b,
            b'f' => 0x0c,
            b'r' => b'\r',
            b'"' => b'"',
            b'\\' => b'\\',
            d @ b'0'..=b'3' => {
                let mut value = u32::from(d - b'0');
                for _ in 0..2 {
                    match iter.next()? {
                        o @ b'0'..=b'7' => value = value * 8 + u32::from(o - b'0'),
                        _ => return None,
                    }
                }
                u8::try_from(value).ok()?
            }
            _ => return None,
        };
        bytes.push(escaped);
    }

    String::from_utf8(bytes).ok()
}

/// Where hunk lines currently go
enum Owner {
    /// No file marker seen yet
    Nothing,
    /// Index into the kept targets
    Kept(usize),
    /// A file we are not interested in
    Discarded,
}

/// Parse zero-context diff text into targets for source files under `root`.
///
/// Files whose names do not end in one of `suffixes` are dropped along with
/// their hunks. A hunk header before any file marker is a `MalformedDiff`.
pub fn parse_unified_diff(
    input: &str,
    root: &Path,
    suffixes: &[String],
) -> Result<Vec<HunkTarget>, ErrorKind> {
    let mut targets: Vec<HunkTarget> = Vec::new();
    let mut owner = Owner::Nothing;

    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim_end_matches('\r');

        if line.starts_with("diff ") {
            // New file section; hunks before its +++ marker belong to nobody
            owner = Owner::Discarded;
            continue;
        }

        if let Some(caps) = FILE_RE.captures(line) {
            let name = match (caps.get(1), caps.get(2)) {
                (Some(quoted), _) => {
                    unquote_path(quoted.as_str()).ok_or_else(|| ErrorKind::MalformedDiff {
                        line_no: idx + 1,
                        line: line.to_string(),
                    })?
                }
                (None, Some(plain)) => plain.as_str().to_string(),
                (None, None) => continue,
            };
            let path = root.join(name);
            if has_suffix(&path, suffixes) {
                targets.push(HunkTarget::with_ranges(path, Vec::new()));
                owner = Owner::Kept(targets.len() - 1);
            } else {
                owner = Owner::Discarded;
            }
            continue;
        }

        if line.starts_with("+++ ") {
            // +++ /dev/null and friends
            owner = Owner::Discarded;
            continue;
        }

        if let Some(caps) = HUNK_RE.captures(line) {
            let malformed = || ErrorKind::MalformedDiff {
                line_no: idx + 1,
                line: line.to_string(),
            };

            let start: usize = caps[1].parse().map_err(|_| malformed())?;
            let count: Option<usize> = match caps.get(2) {
                Some(m) => Some(m.as_str().parse().map_err(|_| malformed())?),
                None => None,
            };

            match owner {
                Owner::Nothing => return Err(malformed()),
                Owner::Discarded => {}
                Owner::Kept(i) => {
                    if let Some(range) = LineRange::from_hunk(start, count) {
                        if let Some(ranges) = targets[i].ranges.as_mut() {
                            ranges.push(range);
                        }
                    }
                }
            }
        }
    }

    Ok(targets)
}
