//! # parlor-shared
//!
//! Types shared by the store and the server: identifiers, the authenticated
//! [`Principal`], socket room addressing, the direct/group conversation
//! union, and input validation.

pub mod constants;
pub mod error;
pub mod types;
pub mod validate;

pub use error::ValidationError;
pub use types::*;
