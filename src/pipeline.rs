use crate::error::ShellError;

/// One pipeline stage before redirections are extracted.
pub type Segment = Vec<String>;

/// The pipe operator token.
pub const PIPE: &str = "|";

/// Splits a token stream into pipeline segments on the exact `|` token.
///
/// An empty token stream yields no segments. A `|` with nothing on one
/// side of it is rejected.
pub fn split(tokens: Vec<String>) -> Result<Vec<Segment>, ShellError> {
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        if token == PIPE {
            if current.is_empty() {
                return Err(ShellError::MalformedPipeline);
            }
            segments.push(std::mem::take(&mut current));
        } else {
            current.push(token);
        }
    }
    if current.is_empty() {
        return Err(ShellError::MalformedPipeline);
    }
    segments.push(current);

    Ok(segments)
}
