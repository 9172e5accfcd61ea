pub mod classifier;
pub mod digest;
pub mod error;
pub mod event_log;
pub mod notification;
pub mod paths;
pub mod persist;
pub mod settings;
pub mod state_store;

pub use error::{FimError, Result};
