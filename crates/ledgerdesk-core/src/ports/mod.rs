//! Port definitions (hexagonal architecture)
//!
//! - [`token_store::TokenStore`] - session token persistence
//! - [`notification::Notifier`] - transient user notifications
//! - [`navigation::Navigator`] - front-end routing

pub mod navigation;
pub mod notification;
pub mod token_store;

pub use navigation::Navigator;
pub use notification::{Notification, NotificationLevel, Notifier};
pub use token_store::TokenStore;
