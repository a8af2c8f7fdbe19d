pub mod cli;
pub mod content_store;
pub mod events;
pub mod load_config;

pub use cli::{run, Cli, Commands};
