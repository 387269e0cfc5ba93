//! Compiled substitution statements and their execution.

use crate::grammar::{self, Matcher, RawCommand};
use crate::message::PassiveCommand;
use regex::{Regex, RegexBuilder};

/// Errors produced while turning a command into a statement.
#[derive(Debug, thiserror::Error)]
pub enum SedError {
    /// The find segment is not a valid regular expression.
    #[error("failed to compile regex: {source}")]
    MalformedPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// An executable find/replace.
#[derive(Debug, Clone)]
pub struct SedStatement {
    find: Regex,
    replace: String,
    global: bool,
}

impl SedStatement {
    /// Compile extracted command fields.
    ///
    /// `g` in the flags replaces every match, `i` matches case-insensitively.
    pub fn compile(raw: &RawCommand) -> Result<Self, SedError> {
        let pattern = unescape_pattern(&raw.pattern, raw.delimiter);
        let find = RegexBuilder::new(&pattern)
            .case_insensitive(raw.flags.contains('i'))
            .build()
            .map_err(|source| SedError::MalformedPattern {
                pattern: raw.pattern.clone(),
                source,
            })?;

        Ok(Self {
            replace: translate_replacement(&raw.replacement, raw.delimiter, &find),
            find,
            global: raw.flags.contains('g'),
        })
    }

    pub fn find(&self) -> &Regex {
        &self.find
    }

    pub const fn is_global(&self) -> bool {
        self.global
    }

    /// Apply the substitution to `body`.
    ///
    /// Without `g` only the leftmost match is replaced and the text after it
    /// is copied verbatim. A body with no match comes back unchanged.
    pub fn exec(&self, body: &str) -> String {
        if self.global {
            return self.find.replace_all(body, self.replace.as_str()).into_owned();
        }

        let Some(caps) = self.find.captures(body) else {
            return body.to_string();
        };
        let Some(whole) = caps.get(0) else {
            return body.to_string();
        };

        let mut out = String::with_capacity(body.len() + self.replace.len());
        out.push_str(&body[..whole.start()]);
        caps.expand(&self.replace, &mut out);
        out.push_str(&body[whole.end()..]);
        out
    }
}

/// Derive a statement from a message.
///
/// A host pre-matched command is used first. Otherwise `matchers` are run
/// over `text`. `Ok(None)` means the text is not a substitution command at
/// all; `Err` means it looked like one but the pattern is broken.
pub fn parse(
    text: &str,
    passive: Option<&PassiveCommand>,
    matchers: &[Matcher],
) -> Result<Option<SedStatement>, SedError> {
    let raw = match passive {
        Some(cmd) => RawCommand::from(cmd),
        None => match grammar::find_command(text, matchers) {
            Some(raw) => raw,
            None => return Ok(None),
        },
    };
    SedStatement::compile(&raw).map(Some)
}

/// Turn `\<delim>` into a literal delimiter, escaped when it is a regex
/// metacharacter. Other escapes pass through.
fn unescape_pattern(pattern: &str, delimiter: char) -> String {
    if delimiter == '\\' {
        return pattern.to_string();
    }
    let literal = regex::escape(&delimiter.to_string());
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) if next == delimiter => out.push_str(&literal),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Convert a user replacement into `regex` expansion syntax.
///
/// - `\<delim>` becomes the literal delimiter
/// - `\1`..`\9` become `${1}`..`${9}`
/// - `\\` becomes a single backslash
/// - `$1`, `${1}`, `$name` and `${name}` stay references when `find` has
///   that group; any other `$` is a literal dollar sign
fn translate_replacement(replacement: &str, delimiter: char, find: &Regex) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut rest = replacement;
    while let Some(c) = rest.chars().next() {
        rest = &rest[c.len_utf8()..];
        match c {
            '\\' => {
                let Some(next) = rest.chars().next() else {
                    out.push('\\');
                    break;
                };
                if next == delimiter && next != '\\' {
                    rest = &rest[next.len_utf8()..];
                    if next == '$' {
                        out.push_str("$$");
                    } else {
                        out.push(next);
                    }
                } else if next.is_ascii_digit() {
                    rest = &rest[1..];
                    out.push_str(&format!("${{{next}}}"));
                } else if next == '\\' {
                    rest = &rest[1..];
                    out.push('\\');
                } else {
                    out.push('\\');
                }
            }
            '$' => rest = push_dollar(rest, find, &mut out),
            _ => out.push(c),
        }
    }
    out
}

/// Emit the `$` whose trailing text is `rest`, returning what is left.
///
/// Group references are written braced so following text cannot extend
/// the name.
fn push_dollar<'a>(rest: &'a str, find: &Regex, out: &mut String) -> &'a str {
    if let Some(tail) = rest.strip_prefix('$') {
        out.push_str("$$");
        return tail;
    }
    let (name, tail) = match rest.strip_prefix('{') {
        Some(inner) => match inner.find('}') {
            Some(end) => (&inner[..end], &inner[end + 1..]),
            None => ("", rest),
        },
        None => {
            let end = rest
                .find(|c: char| c != '_' && !c.is_ascii_alphanumeric())
                .unwrap_or(rest.len());
            rest.split_at(end)
        }
    };
    if names_group(find, name) {
        out.push_str("${");
        out.push_str(name);
        out.push('}');
        tail
    } else {
        out.push_str("$$");
        rest
    }
}

fn names_group(find: &Regex, name: &str) -> bool {
    match name.parse::<usize>() {
        Ok(index) => index < find.captures_len(),
        Err(_) => find.capture_names().flatten().any(|n| n == name),
    }
}
