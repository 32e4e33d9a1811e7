//! Ordered rewrites that make a generated scanner embeddable
//!
//! Order matters: the buffer-size type is widened before the namespace is
//! opened, and the stdin/stdout fallbacks are removed one idiom at a time
//! because each removal relies on the newline the previous one leaves behind.

use crate::error::ErrorKind;
use regex::{NoExpand, Regex};

/// How a rule changes the text
#[derive(Debug, Clone)]
pub enum Rewrite {
    /// Replace every match of each pattern in turn with literal text
    Replace(Vec<(Regex, String)>),
    /// Open `name` right after `anchor` and close it at the end of the file
    Namespace { anchor: Regex, name: String },
}

/// A named step of the patch pipeline
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pub name: &'static str,
    pub rewrite: Rewrite,
}

impl RewriteRule {
    fn replace(name: &'static str, steps: &[(&str, &str)]) -> Result<Self, regex::Error> {
        let steps = steps
            .iter()
            .map(|(pattern, replacement)| Ok((Regex::new(pattern)?, replacement.to_string())))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self {
            name,
            rewrite: Rewrite::Replace(steps),
        })
    }

    /// Apply the rule; the flag says whether anything changed
    pub fn apply(&self, text: &str) -> Result<(String, bool), ErrorKind> {
        match &self.rewrite {
            Rewrite::Replace(steps) => {
                let mut out = text.to_string();
                for (pattern, replacement) in steps {
                    out = pattern
                        .replace_all(&out, NoExpand(replacement))
                        .into_owned();
                }
                let changed = out != text;
                Ok((out, changed))
            }
            Rewrite::Namespace { anchor, name } => {
                let Some(found) = anchor.find(text) else {
                    return Err(ErrorKind::MissingAnchor {
                        rule: self.name.to_string(),
                    });
                };
                let mut out = String::with_capacity(text.len() + 2 * name.len() + 32);
                out.push_str(&text[..found.end()]);
                out.push_str(&format!("namespace {} {{\n", name));
                out.push_str(&text[found.end()..]);
                out.push_str(&format!("\n}} /* {} */\n", name));
                Ok((out, true))
            }
        }
    }
}

/// The fixed rule sequence, in application order
pub fn default_rules(namespace: &str) -> Result<Vec<RewriteRule>, regex::Error> {
    Ok(vec![
        RewriteRule::replace(
            "widen-buffer-size",
            &[
                (r"\bint yy_buf_size;\r\n", "yy_size_t yy_buf_size;\r\n"),
                (r"\bint yy_buf_size;\n", "yy_size_t yy_buf_size;\n"),
            ],
        )?,
        RewriteRule {
            name: "wrap-namespace",
            rewrite: Rewrite::Namespace {
                anchor: Regex::new(r"\n#ifndef FLEXINT_H\r?\n#define FLEXINT_H\r?\n")?,
                name: namespace.to_string(),
            },
        },
        RewriteRule::replace("drop-register", &[(r"\bregister ", "")])?,
        RewriteRule::replace("silence-fprintf", &[(r"(?:\(void\)[ ]*)?\bfprintf", "//")])?,
        RewriteRule::replace(
            "throw-on-exit",
            &[(r"\bexit\(", "throw std::runtime_error(msg); //")],
        )?,
        RewriteRule::replace(
            "drop-stream-fallbacks",
            &[
                (
                    r"\n\s*if\s*\(\s*!\s*yyin\s*\)\s*\n\s*yyin\s*=\s*stdin;\s*\n",
                    "\n",
                ),
                (
                    r"\n\s*if\s*\(\s*!\s*yyout\s*\)\s*\n\s*yyout\s*=\s*stdout;\s*\n",
                    "\n",
                ),
            ],
        )?,
        RewriteRule::replace(
            "null-stream-init",
            &[(
                r"#ifdef\s*YY_STDINIT\n\s*yyin = stdin;\n\s*yyout = stdout;\n#else\n\s*yyin = (?:NULL|\(FILE \*\) 0);\n\s*yyout = (?:NULL|\(FILE \*\) 0);\n#endif",
                "    yyin = (FILE *) 0;\n    yyout = (FILE *) 0;",
            )],
        )?,
    ])
}
