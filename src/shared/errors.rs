use thiserror::Error;

/// Errors raised while detecting and normalizing an export file
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Unknown export format: {0}")]
    UnknownFormat(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(String),
}

/// Errors raised by the granular, markdown and archive exporters
#[derive(Debug, Error)]
pub enum ExportError {
    /// Requested element does not exist on the message
    #[error("{what} not available for message {message_uuid}")]
    NotAvailable { what: String, message_uuid: String },

    #[error("Nothing to export: {0}")]
    EmptyInput(String),

    #[error("Export cancelled")]
    Cancelled,

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// LaTeX fragment could not be approximated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LatexError {
    #[error("Unbalanced braces in formula")]
    UnbalancedBraces,

    #[error("Missing argument for \\{0}")]
    MissingArgument(String),

    #[error("Empty formula")]
    Empty,

    #[error("Formula nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Errors from the PDF pagination engine
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF font was never requested; load a font before exporting")]
    FontNotRequested,

    #[error("PDF font is still downloading ({0}%), try again when it is ready")]
    FontDownloading(u8),

    #[error("PDF font failed to load: {0}")]
    FontFailed(String),

    #[error("Nothing to export: {0}")]
    EmptyInput(String),

    #[error("Text measurement failed: {0}")]
    Measure(String),

    #[error("Formula error: {0}")]
    Formula(#[from] LatexError),

    #[error("PDF rendering failed: {0}")]
    Render(String),
}

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Corrupt overlay value at {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
