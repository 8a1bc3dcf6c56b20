use thiserror::Error;

/// Malformed input detected before anything is written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("A message must target either a recipient or a group, not both")]
    BothTargets,

    #[error("A message must target a recipient or a group")]
    NoTarget,

    #[error("Cannot send a direct message to yourself")]
    SelfRecipient,

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is too long ({len} chars, max {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
