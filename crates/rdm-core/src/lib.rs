pub mod checksum;
pub mod config;
pub mod engine;
pub mod filename;
pub mod interfaces;
pub mod logging;
pub mod probe;
pub mod route;
