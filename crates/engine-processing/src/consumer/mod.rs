pub mod config;
pub mod worker;

pub use worker::IngestWorker;
