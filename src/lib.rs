pub mod auth;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod source;
pub mod store;
pub mod sync;
pub mod view;

pub use error::{Error, Result};
