use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial: {0}")]
    Serial(#[from] serialport::Error),
    #[error("port closed (EOF)")]
    Eof,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
