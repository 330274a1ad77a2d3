/// Failure of the mutation engine.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Timestamp {timestamp} cannot be advanced by {clone_count} without overflow")]
    TimestampOverflow { timestamp: i64, clone_count: u32 },

    #[error("Mutated {field} of the reading at {timestamp} is not a finite number")]
    NonFiniteValue { field: &'static str, timestamp: i64 },
}
