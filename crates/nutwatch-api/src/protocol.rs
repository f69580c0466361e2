// ── upsd line protocol helpers ──
//
// upsd speaks newline-terminated text. Arguments are separated by spaces;
// arguments with spaces are wrapped in double quotes, and `"` / `\` inside
// them are backslash-escaped.

use crate::error::Error;

/// Split one response line into words, honouring quotes and escapes.
///
/// `VAR ups1 ups.status "OL CHRG"` yields `["VAR", "ups1", "ups.status", "OL CHRG"]`.
/// An empty quoted argument (`""`) produces an empty word.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut in_quotes = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                in_word = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_word {
        words.push(current);
    }
    words
}

/// Encode a single argument for an outgoing command.
pub fn quote(arg: &str) -> String {
    let needs_quotes = arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"');
    if !needs_quotes && !arg.contains('\\') {
        return arg.to_owned();
    }

    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Build a command line (without the trailing newline) from words.
pub fn command(words: &[&str]) -> String {
    words
        .iter()
        .map(|w| quote(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turn an `ERR <code> [message...]` line into an [`Error::Protocol`].
pub(crate) fn parse_err(words: &[String]) -> Option<Error> {
    match words {
        [head, code, rest @ ..] if head == "ERR" => Some(Error::Protocol {
            code: code.clone(),
            message: (!rest.is_empty()).then(|| rest.join(" ")),
        }),
        [head] if head == "ERR" => Some(Error::Protocol {
            code: "UNKNOWN".into(),
            message: None,
        }),
        _ => None,
    }
}
