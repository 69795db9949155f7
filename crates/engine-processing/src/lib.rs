pub mod consumer;
pub mod error;
pub mod producer;
pub mod queue;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
