//! Changed-line selection from version control diffs

mod git;
mod parser;

pub use git::{DiffSource, diff_text};
pub use parser::{HunkTarget, LineRange, parse_unified_diff};
