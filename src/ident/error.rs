/// Errors that can occur while reading identification results
#[derive(Debug, thiserror::Error)]
pub enum IdentError {
    /// Error parsing XML
    #[error("XML parsing error: {0}")]
    XmlError(#[from] quick_xml::Error),

    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// UTF-8 encoding error in an attribute value
    #[error("UTF-8 encoding error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
}
