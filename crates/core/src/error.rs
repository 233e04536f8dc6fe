use thiserror::Error;

#[derive(Error, Debug)]
pub enum CadenceError {
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Duration out of range: {0}s")]
    DurationOutOfRange(u64),
}

pub type Result<T> = std::result::Result<T, CadenceError>;
