use crate::error::ShellError;

/// Tokenizes shell input into a vector of strings.
/// Handles quotes and escapes. Operators such as `|` and `>` are plain
/// words here; later stages recognize them by exact match.
///
/// An unterminated quote is an error rather than being absorbed into the
/// last token.
pub fn tokenize(input: &str) -> Result<Vec<String>, ShellError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    // A quoted fragment counts as a token even when it is empty (`''`).
    let mut pending = false;
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_single_quote {
            if c == '\'' {
                in_single_quote = false;
            } else {
                current.push(c);
            }
        } else if in_double_quote {
            match c {
                '"' => in_double_quote = false,
                '\\' => match chars.peek() {
                    Some(&next @ ('\\' | '"' | '$' | '\n')) => {
                        chars.next();
                        current.push(next);
                    }
                    _ => current.push('\\'),
                },
                _ => current.push(c),
            }
        } else {
            match c {
                '\\' => {
                    current.push(chars.next().unwrap_or('\\'));
                    pending = true;
                }
                '\'' => {
                    in_single_quote = true;
                    pending = true;
                }
                '"' => {
                    in_double_quote = true;
                    pending = true;
                }
                ' ' | '\t' | '\n' => {
                    if pending {
                        tokens.push(std::mem::take(&mut current));
                        pending = false;
                    }
                }
                _ => {
                    current.push(c);
                    pending = true;
                }
            }
        }
    }

    if in_single_quote {
        return Err(ShellError::MalformedQuoting("single"));
    }
    if in_double_quote {
        return Err(ShellError::MalformedQuoting("double"));
    }
    if pending {
        tokens.push(current);
    }

    Ok(tokens)
}
