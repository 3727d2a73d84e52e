//! Domain types shared between the client and its consumers

pub mod errors;
pub mod session;

pub use errors::{ErrorKind, FieldErrors, NormalizedError};
pub use session::{Session, UserProfile};
