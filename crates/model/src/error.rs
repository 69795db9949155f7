use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// The decoded row does not carry exactly one value per activity column.
    #[error("Expected {expected} fields, found {found}")]
    Arity { expected: usize, found: usize },
}
