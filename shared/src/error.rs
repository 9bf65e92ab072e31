use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Corrupt status record {id}: {reason}")]
    CorruptRecord { id: i32, reason: String },
    #[error("Transition {from} -> {to} not allowed for document {id}")]
    InvalidTransition {
        id: i32,
        from: &'static str,
        to: &'static str,
    },
}

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        AppError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
