//! Line-level comparison of a file against formatter output

use serde::{Deserialize, Serialize};
use similar::{DiffOp, TextDiff};

/// One line where the formatter disagrees with the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deviation {
    /// 1-based line in the original file; insertions point at the line they precede
    pub line: usize,
    /// Current content, absent for lines the formatter would insert
    pub original: Option<String>,
    /// Formatter's content, absent for lines the formatter would drop
    pub suggested: Option<String>,
    /// Set when only the line terminator differs; the text itself is unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Deviation {
    fn changed(line: usize, original: Option<String>, suggested: Option<String>) -> Self {
        Self {
            line,
            original,
            suggested,
            note: None,
        }
    }
}

const NO_NEWLINE_AT_EOF: &str = "No newline at end of file";
const FORMATTER_DROPS_EOF_NEWLINE: &str = "Formatter output has no newline at end of file";
const LINE_ENDING_DIFFERS: &str = "Line ending differs";

fn content(raw: &str) -> &str {
    raw.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(raw)
}

/// What differs between two lines with the same content
fn terminator_note(old_raw: &str, new_raw: &str) -> &'static str {
    if !old_raw.ends_with('\n') {
        NO_NEWLINE_AT_EOF
    } else if !new_raw.ends_with('\n') {
        FORMATTER_DROPS_EOF_NEWLINE
    } else {
        LINE_ENDING_DIFFERS
    }
}

/// Every line that differs between `original` and `formatted`
pub fn line_deviations(original: &str, formatted: &str) -> Vec<Deviation> {
    if original == formatted {
        return Vec::new();
    }

    let diff = TextDiff::from_lines(original, formatted);
    let old = diff.old_slices();
    let new = diff.new_slices();
    let old_line = |i: usize| old.get(i).map(|s| content(s).to_string());
    let new_line = |i: usize| new.get(i).map(|s| content(s).to_string());

    let mut deviations = Vec::new();

    for op in diff.ops() {
        match *op {
            DiffOp::Equal { .. } => {}
            DiffOp::Delete {
                old_index, old_len, ..
            } => {
                for i in old_index..old_index + old_len {
                    deviations.push(Deviation::changed(i + 1, old_line(i), None));
                }
            }
            DiffOp::Insert {
                old_index,
                new_index,
                new_len,
            } => {
                for j in new_index..new_index + new_len {
                    deviations.push(Deviation::changed(old_index + 1, None, new_line(j)));
                }
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                for k in 0..old_len.max(new_len) {
                    if k < old_len && k < new_len {
                        let old_raw = old[old_index + k];
                        let new_raw = new[new_index + k];
                        if content(old_raw) == content(new_raw) {
                            deviations.push(Deviation {
                                line: old_index + k + 1,
                                original: None,
                                suggested: None,
                                note: Some(terminator_note(old_raw, new_raw).to_string()),
                            });
                            continue;
                        }
                    }

                    let line = if k < old_len {
                        old_index + k + 1
                    } else {
                        old_index + old_len + 1
                    };
                    deviations.push(Deviation::changed(
                        line,
                        (k < old_len).then(|| old_line(old_index + k)).flatten(),
                        (k < new_len).then(|| new_line(new_index + k)).flatten(),
                    ));
                }
            }
        }
    }

    deviations
}
