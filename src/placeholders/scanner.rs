/// A piece of query text, split at placeholder tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Token<'a> {
    /// Verbatim SQL (literals, comments and everything that is not a placeholder).
    Text(&'a str),
    /// `?`
    Positional,
    /// `??`
    Raw,
    /// `:name`, without the colon.
    Named(&'a str),
    /// `?N`, left for the backend to resolve.
    Numbered(&'a str),
}

#[derive(Clone, Copy)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Backtick,
    LineComment,
    BlockComment(u32),
}

/// Split `sql` into text and placeholder tokens.
///
/// Quoted literals, backtick identifiers and comments never yield placeholders, and `::name`
/// (a cast) is text. Inside quotes a doubled quote is always an escape; with
/// `backslash_escapes` a backslash also escapes the next character, so `'it\'s ?'` stays one
/// literal.
pub(super) fn tokenize(sql: &str, backslash_escapes: bool) -> Vec<Token<'_>> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut state = State::Normal;
    let mut text_start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'`' => state = State::Backtick,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    idx += 1;
                }
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b':' if bytes.get(idx + 1) == Some(&b':') => {
                    // cast; skip both colons and the type name stays text
                    idx += 1;
                }
                b':' => {
                    if let Some(end) = scan_identifier(bytes, idx + 1) {
                        flush(&mut tokens, sql, text_start, idx);
                        tokens.push(Token::Named(&sql[idx + 1..end]));
                        text_start = end;
                        idx = end;
                        continue;
                    }
                }
                b'?' => {
                    flush(&mut tokens, sql, text_start, idx);
                    if bytes.get(idx + 1) == Some(&b'?') {
                        tokens.push(Token::Raw);
                        idx += 2;
                    } else if let Some(end) = scan_digits(bytes, idx + 1) {
                        tokens.push(Token::Numbered(&sql[idx..end]));
                        idx = end;
                    } else {
                        tokens.push(Token::Positional);
                        idx += 1;
                    }
                    text_start = idx;
                    continue;
                }
                _ => {}
            },
            State::SingleQuoted | State::DoubleQuoted if backslash_escapes && b == b'\\' => {
                idx += 1;
            }
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Backtick => {
                if b == b'`' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if b == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    flush(&mut tokens, sql, text_start, bytes.len());
    tokens
}

fn flush<'a>(tokens: &mut Vec<Token<'a>>, sql: &'a str, start: usize, end: usize) {
    if end > start {
        tokens.push(Token::Text(&sql[start..end]));
    }
}

/// End of a `[A-Za-z_][A-Za-z0-9_-]*` identifier starting at `start`.
fn scan_identifier(bytes: &[u8], start: usize) -> Option<usize> {
    let first = *bytes.get(start)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len()
        && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_' || bytes[idx] == b'-')
    {
        idx += 1;
    }
    Some(idx)
}

fn scan_digits(bytes: &[u8], start: usize) -> Option<usize> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    (idx > start).then_some(idx)
}
