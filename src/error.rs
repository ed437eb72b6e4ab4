use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Unknown payment status code: {0}")]
    UnknownStatus(i32),
    #[error("Storage constraint violated: {0}")]
    StorageConstraint(String),
    #[error("Payment not found: {0}")]
    NotFound(String),
    #[error("ILS error: {0}")]
    IlsError(String),
    #[error("Notification error: {0}")]
    NotificationError(String),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, PaymentError>;
