//! Shared record model, protocol definitions, and errors for the item encryptor crates.

pub mod action;
pub mod error;
pub mod item;
pub mod protocol;

pub use action::CryptoAction;
pub use error::ServiceError;
pub use item::{AttributeValue, Item, ValueError};
