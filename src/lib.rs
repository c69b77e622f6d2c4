pub mod batch;
pub mod classify;
pub mod cli;
pub mod config;
pub mod discover;
pub mod driver;
pub mod engine;
pub mod error;
pub mod pdf;
pub mod postprocess;
pub mod report;
pub mod router;
pub mod slice;
pub mod tables;
pub mod util;
