use crate::error::{MultipartError, Result};
use rand::{distributions::Alphanumeric, thread_rng, Rng};

const BOUNDARY_LEN: usize = 60;
const MAX_BOUNDARY_LEN: usize = 70;

/// Generate a random alphanumeric boundary
pub(crate) fn generate() -> String {
    let mut rng = thread_rng();

    (&mut rng)
        .sample_iter(Alphanumeric)
        .take(BOUNDARY_LEN)
        .map(char::from)
        .collect()
}

/// Check a boundary against the `bchars` grammar of RFC 2046:
///
/// ```text
/// boundary := 0*69<bchars> bcharsnospace
/// bchars := bcharsnospace / " "
/// bcharsnospace := DIGIT / ALPHA / "'" / "(" / ")" / "+" / "_" / "," / "-" / "." / "/" / ":" / "=" / "?"
/// ```
pub(crate) fn validate(boundary: &str) -> Result<()> {
    if boundary.is_empty() {
        return Err(MultipartError::InvalidBoundary(
            "boundary must not be empty".into(),
        ));
    }

    if boundary.len() > MAX_BOUNDARY_LEN {
        return Err(MultipartError::InvalidBoundary(format!(
            "boundary is {} characters long, at most {MAX_BOUNDARY_LEN} are allowed",
            boundary.len()
        )));
    }

    if let Some(invalid) = boundary.chars().find(|c| !is_bchar(*c)) {
        return Err(MultipartError::InvalidBoundary(format!(
            "character {invalid:?} is not allowed in a boundary"
        )));
    }

    if boundary.ends_with(' ') {
        return Err(MultipartError::InvalidBoundary(
            "boundary must not end with a space".into(),
        ));
    }

    Ok(())
}

fn is_bchar(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '\'' | '(' | ')' | '+' | '_' | ',' | '-' | '.' | '/' | ':' | '=' | '?' | ' '
        )
}

/// The `Content-Type` header value, quoting boundaries that aren't a plain http token
pub(crate) fn content_type(boundary: &str) -> String {
    if boundary.contains(is_tspecial) {
        format!("multipart/form-data; boundary=\"{boundary}\"")
    } else {
        format!("multipart/form-data; boundary={boundary}")
    }
}

fn is_tspecial(c: char) -> bool {
    matches!(c, '(' | ')' | ',' | '/' | ':' | '=' | '?' | ' ')
}
