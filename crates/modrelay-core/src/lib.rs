pub mod auth;
pub mod channel;
pub mod config;
pub mod discord;
pub mod error;
pub mod format;
pub mod poll;
pub mod reconcile;
pub mod reddit;
pub mod source;
pub mod store;

pub use error::{RelayError, Result};
