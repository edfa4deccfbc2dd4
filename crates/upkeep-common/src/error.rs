use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("rollback error: {0}")]
    Rollback(String),

    #[error("migration discovery error: {0}")]
    Discovery(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
