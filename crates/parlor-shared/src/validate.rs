//! Input checks shared by every mutation path.
//!
//! Each helper returns the trimmed value on success so callers persist the
//! normalized form.

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::error::ValidationError;

/// Trimmed, non-empty, at most `max` characters.
pub fn required_text(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    bounded(field, trimmed, max)?;
    Ok(trimmed.to_string())
}

/// Optional text: blank collapses to `None`, otherwise bounded like
/// [`required_text`].
pub fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => {
            bounded(field, v, max)?;
            Ok(Some(v.to_string()))
        }
    }
}

/// Loose shape check for a contact address; deliverability is not our concern.
pub fn email(value: &str) -> Result<String, ValidationError> {
    let trimmed = required_text("email", value, 320)?;
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(trimmed),
        _ => Err(ValidationError::Invalid {
            field: "email",
            reason: "expected local@domain".to_string(),
        }),
    }
}

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn page_size(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

fn bounded(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::TooLong { field, len, max });
    }
    Ok(())
}
