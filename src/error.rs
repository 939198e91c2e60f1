use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifuError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),
    #[error("cannot convert '{from}' to '{to}': incompatible dimensions")]
    IncompatibleUnits { from: String, to: String },
    #[error("unknown material '{0}'")]
    UnknownMaterial(String),
    #[error("unknown grid dimension '{0}'")]
    UnknownDimension(String),
    #[error("{context} length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),
    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, LifuError>;
