pub mod bootstrap;
pub mod config;
pub mod monitor;
pub mod watcher;
