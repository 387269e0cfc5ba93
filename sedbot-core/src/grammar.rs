//! Recognition of sed-style substitution commands in message text.
//!
//! Two surface forms are understood:
//!
//! ```text
//! s/find/replace/flags            short form, must be the whole message
//! please sed s#find#replace# now   long form, anywhere in the message
//! ```
//!
//! The delimiter is whatever character follows the `s`. Inside the find and
//! replace segments the delimiter may appear when escaped with a backslash.
//! Matchers are tried in order; the first hit wins.

use crate::message::PassiveCommand;
use regex::Regex;

/// Token that introduces the long form.
const LONG_FORM_TOKEN: &str = "sed s";

/// Fields extracted from a substitution command, before compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommand {
    /// Delimiter character chosen by the user
    pub delimiter: char,
    /// Regular expression source
    pub pattern: String,
    /// Replacement template
    pub replacement: String,
    /// Flag characters, possibly empty
    pub flags: String,
}

impl From<&PassiveCommand> for RawCommand {
    fn from(cmd: &PassiveCommand) -> Self {
        Self {
            delimiter: cmd.delimiter,
            pattern: cmd.pattern.clone(),
            replacement: cmd.replacement.clone(),
            flags: cmd.flags.clone().unwrap_or_default(),
        }
    }
}

/// A named grammar branch.
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    pub name: &'static str,
    pub find: fn(&str) -> Option<RawCommand>,
}

/// Short form: `s/find/replace/flags` spanning the whole message.
pub const SHORT_FORM: Matcher = Matcher {
    name: "short",
    find: find_short,
};

/// Long form: `sed s/find/replace/flags` anywhere in the message.
pub const LONG_FORM: Matcher = Matcher {
    name: "long",
    find: find_long,
};

/// All matchers, in priority order.
pub const MATCHERS: &[Matcher] = &[SHORT_FORM, LONG_FORM];

/// Run `matchers` in order against `text` and return the first hit.
pub fn find_command(text: &str, matchers: &[Matcher]) -> Option<RawCommand> {
    matchers.iter().find_map(|m| {
        let found = (m.find)(text);
        if let Some(ref cmd) = found {
            tracing::debug!(
                matcher = m.name,
                delimiter = %cmd.delimiter,
                flags = %cmd.flags,
                "Found substitution command"
            );
        }
        found
    })
}

/// One delimited segment: escaped pairs or anything but a backslash or the
/// delimiter. Stops at the first unescaped delimiter.
fn segment(delim: &str) -> String {
    format!(r"((?:\\.|[^\\{delim}])*)")
}

/// Build the scanning regex for a given delimiter. `prefix` is the regex
/// placed before the first delimiter, `flags` the one after the last.
fn scanner(delimiter: char, prefix: &str, flags: &str) -> Option<Regex> {
    let delim = regex::escape(&delimiter.to_string());
    let seg = segment(&delim);
    let source = format!("(?s){prefix}{delim}{seg}{delim}{seg}{delim}{flags}");
    match Regex::new(&source) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::debug!(delimiter = %delimiter, error = %e, "Delimiter not usable");
            None
        }
    }
}

fn capture_command(re: &Regex, text: &str, delimiter: char) -> Option<RawCommand> {
    let caps = re.captures(text)?;
    let get = |i: usize| caps.get(i).map_or("", |m| m.as_str()).to_string();
    Some(RawCommand {
        delimiter,
        pattern: get(1),
        replacement: get(2),
        flags: get(3),
    })
}

fn find_short(text: &str) -> Option<RawCommand> {
    let mut chars = text.chars();
    if chars.next() != Some('s') || text.chars().count() < 4 {
        return None;
    }
    let delimiter = chars.next()?;
    let re = scanner(delimiter, "^s", "([gi]*)$")?;
    capture_command(&re, text, delimiter)
}

/// Byte offset of the first ASCII-case-insensitive `sed s`.
fn find_token(text: &str) -> Option<usize> {
    text.as_bytes()
        .windows(LONG_FORM_TOKEN.len())
        .position(|w| w.eq_ignore_ascii_case(LONG_FORM_TOKEN.as_bytes()))
}

fn find_long(text: &str) -> Option<RawCommand> {
    let index = find_token(text)?;
    let after = index + LONG_FORM_TOKEN.len();
    // Room for the delimiter plus two more delimiters at minimum
    if after + 3 > text.len() {
        return None;
    }
    let delimiter = text[after..].chars().next()?;
    let re = scanner(delimiter, "(?i:sed s)", r"(\w*)")?;
    let cmd = capture_command(&re, &text[index..], delimiter)?;
    if cmd.flags.chars().all(|c| c == 'g' || c == 'i') {
        Some(cmd)
    } else {
        tracing::debug!(flags = %cmd.flags, "Ignoring long form with unknown flags");
        None
    }
}
