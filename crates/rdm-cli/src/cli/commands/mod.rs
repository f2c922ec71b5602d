//! CLI command handlers, one file per command.

mod checksum;
mod fetch;
mod interfaces;
mod probe;

pub use checksum::run_checksum;
pub use fetch::{run_fetch, FetchArgs};
pub use interfaces::run_interfaces;
pub use probe::run_probe;
