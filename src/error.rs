use std::sync::Arc;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    InvalidConfig(String),
    InvalidData(String),
    IncompatibleGenerators(usize),
    MutexPoisoned,
    InvalidState(String),
    UnknownComponent(String),
    MissingRequest(String),
    // Construction failure shared by every caller of a single-flight cache load
    Cache(Arc<Error>),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            Error::IncompatibleGenerators(field) => {
                write!(f, "Incompatible generators for field {}", field)
            }
            Error::MutexPoisoned => write!(f, "Mutex was poisoned"),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::UnknownComponent(id) => write!(f, "Unknown component: {}", id),
            Error::MissingRequest(key) => {
                write!(f, "No search request available to create query {}", key)
            }
            Error::Cache(err) => write!(f, "Cache load failed: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::MutexPoisoned
    }
}
