//! Identification header stamping
//!
//! A header is a banner-delimited `//` comment block at the very top of a
//! file that names the project, the file and its repository path:
//!
//! ```text
//! //===----------------------------------------------------------------------===//
//! //
//! //                         BusTub
//! //
//! // b_plus_tree_page.h
//! //
//! // Identification: src/include/storage/page/b_plus_tree_page.h
//! //
//! // Copyright (c) 2015-2026, Carnegie Mellon University Database Group
//! //
//! //===----------------------------------------------------------------------===//
//! ```
//!
//! followed by exactly one blank line. Only blocks with matching open and
//! close banners and an `Identification:` line are ever stripped.

use crate::config::{HeaderConfig, SelfmtConfig};
use crate::error::ErrorKind;
use crate::fs_util::{read_source, write_atomic};
use chrono::Datelike;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

const BANNER: &str =
    "//===----------------------------------------------------------------------===//";

const TITLE_INDENT: &str = "                         ";

// Open banner, any number of `//` lines (lazily), close banner.
// The two banners are captured so the caller can require them to be equal.
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\A(//===-+===//)[ \t]*\r?\n((?://[^\r\n]*\r?\n)*?)(//===-+===//)[ \t]*(?:\r?\n|\z)",
    )
    .expect("header block regex")
});

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^// Identification: ").expect("identification regex"));

static BLANK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A[ \t]*\r?\n").expect("blank line regex"));

/// Result of looking for a header at the top of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSplit<'a> {
    /// One or more header blocks were removed; `rest` follows their trailing blank line
    Found { rest: &'a str },
    Absent,
}

/// Split leading identification blocks off `text`.
pub fn split_header(text: &str) -> HeaderSplit<'_> {
    let mut offset = 0;

    loop {
        let remaining = &text[offset..];
        let Some(caps) = BLOCK_RE.captures(remaining) else {
            break;
        };
        let open = caps.get(1).map_or("", |m| m.as_str());
        let close = caps.get(3).map_or("", |m| m.as_str());
        let body = caps.get(2).map_or("", |m| m.as_str());
        if open != close || !IDENT_RE.is_match(body) {
            break;
        }

        offset += caps.get(0).map_or(0, |m| m.end());
        if let Some(blank) = BLANK_RE.find(&text[offset..]) {
            offset += blank.end();
        }
    }

    if offset == 0 {
        HeaderSplit::Absent
    } else {
        HeaderSplit::Found {
            rest: &text[offset..],
        }
    }
}

/// `text` without any leading identification header
pub fn strip_header(text: &str) -> &str {
    match split_header(text) {
        HeaderSplit::Found { rest } => rest,
        HeaderSplit::Absent => text,
    }
}

/// Fixed parts of a header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderTemplate {
    pub project: String,
    pub holder: String,
    pub start_year: i32,
}

impl HeaderTemplate {
    pub fn from_config(config: &HeaderConfig) -> Self {
        Self {
            project: config.project.clone(),
            holder: config.holder.clone(),
            start_year: config.start_year,
        }
    }

    /// Render a header block, including the trailing blank line
    pub fn render(&self, file_name: &str, rel_path: &str, year: i32) -> String {
        let lines = [
            BANNER.to_string(),
            "//".to_string(),
            format!("//{}{}", TITLE_INDENT, self.project),
            "//".to_string(),
            format!("// {}", file_name),
            "//".to_string(),
            format!("// Identification: {}", rel_path),
            "//".to_string(),
            format!(
                "// Copyright (c) {}-{}, {}",
                self.start_year, year, self.holder
            ),
            "//".to_string(),
            BANNER.to_string(),
            String::new(),
        ];

        let mut out = String::new();
        for line in &lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Replace any existing header of `text` with a freshly rendered one
    pub fn apply(&self, text: &str, file_name: &str, rel_path: &str, year: i32) -> String {
        let mut out = self.render(file_name, rel_path, year);
        out.push_str(strip_header(text));
        out
    }
}

/// Repository-relative path with `/` separators, as written in the header
fn identification_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Rewrite the header of one file in place. Returns whether the file changed.
pub fn update_file_header(config: &SelfmtConfig, path: &Path) -> Result<bool, ErrorKind> {
    let year = chrono::Local::now().year();
    update_file_header_for_year(config, path, year)
}

/// True if the file already carries this year's header; nothing is written
pub fn header_is_current(config: &SelfmtConfig, path: &Path) -> Result<bool, ErrorKind> {
    let year = chrono::Local::now().year();
    let (original, updated) = rendered_file(config, path, year)?;
    Ok(original == updated)
}

fn rendered_file(
    config: &SelfmtConfig,
    path: &Path,
    year: i32,
) -> Result<(String, String), ErrorKind> {
    let original = read_source(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let rel_path = identification_path(&config.root, path);

    let template = HeaderTemplate::from_config(&config.header);
    let updated = template.apply(&original, &file_name, &rel_path, year);
    Ok((original, updated))
}

fn update_file_header_for_year(
    config: &SelfmtConfig,
    path: &Path,
    year: i32,
) -> Result<bool, ErrorKind> {
    let (original, updated) = rendered_file(config, path, year)?;

    if updated == original {
        tracing::debug!(path = %path.display(), "Header already current");
        return Ok(false);
    }

    write_atomic(path, &updated)?;
    tracing::info!(path = %path.display(), "Updated header");
    Ok(true)
}
