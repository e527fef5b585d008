pub mod campaign;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod failure_log;
pub mod job;
pub mod logging;
pub mod partition;
pub mod phase;
pub mod summary;
pub mod ui;
pub mod verdict;
