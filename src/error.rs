use thiserror::Error;

#[derive(Error, Debug)]
pub enum CvrError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Coverage type unavailable: {0}")]
    UnsupportedFormat(String),

    #[error("Could not detect coverage format of {0}; pass --format")]
    UnknownFormat(String),

    #[error("Invalid path prefix pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("GitHub request failed: {0}")]
    Transport(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CvrError>;
