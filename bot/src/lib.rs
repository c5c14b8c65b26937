pub mod config;
pub mod flarum;
pub mod schedule;

pub use config::Cli;
pub use flarum::{DryRunSink, FlarumClient};
pub use schedule::run_schedule;
