use std::fmt;

/// Errors produced while reading tracks, aligning sensor data and rendering frames
#[derive(Debug)]
pub enum OverlayError {
    /// I/O errors
    Io(std::io::Error),
    /// CSV read/write errors
    Csv(csv::Error),
    /// Malformed XML in a GPX or TCX document
    Xml(String),
    /// A track point is missing a required field
    MissingField {
        element: &'static str,
        index: usize,
        field: &'static str,
    },
    /// A field is present but could not be parsed
    InvalidValue { field: &'static str, value: String },
    /// Timestamp could not be parsed
    InvalidTimestamp(String),
    /// Records are not ordered by timestamp
    Unordered { index: usize },
    /// No records to work with
    EmptyTrack,
    /// Requested timestamp lies outside the recorded range
    OutOfRange(String),
    /// Invalid option or argument combination
    InvalidOption(String),
    /// Drawing or image encoding failure
    Render(String),
    /// External tool (ffmpeg, child process) failure
    External(String),
}

impl fmt::Display for OverlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayError::Io(err) => write!(f, "I/O error: {}", err),
            OverlayError::Csv(err) => write!(f, "CSV error: {}", err),
            OverlayError::Xml(msg) => write!(f, "XML error: {}", msg),
            OverlayError::MissingField {
                element,
                index,
                field,
            } => write!(f, "{} #{} is missing '{}'", element, index, field),
            OverlayError::InvalidValue { field, value } => {
                write!(f, "Invalid value for '{}': {:?}", field, value)
            }
            OverlayError::InvalidTimestamp(value) => write!(f, "Invalid timestamp: {:?}", value),
            OverlayError::Unordered { index } => {
                write!(f, "Records are not ordered by time (row {})", index + 1)
            }
            OverlayError::EmptyTrack => write!(f, "Track contains no points"),
            OverlayError::OutOfRange(msg) => {
                write!(f, "Timestamp is out of range of the GPS data: {}", msg)
            }
            OverlayError::InvalidOption(msg) => write!(f, "Invalid option: {}", msg),
            OverlayError::Render(msg) => write!(f, "Render error: {}", msg),
            OverlayError::External(msg) => write!(f, "External command failed: {}", msg),
        }
    }
}

impl std::error::Error for OverlayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OverlayError::Io(err) => Some(err),
            OverlayError::Csv(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OverlayError {
    fn from(err: std::io::Error) -> Self {
        OverlayError::Io(err)
    }
}

impl From<csv::Error> for OverlayError {
    fn from(err: csv::Error) -> Self {
        OverlayError::Csv(err)
    }
}

impl From<quick_xml::Error> for OverlayError {
    fn from(err: quick_xml::Error) -> Self {
        OverlayError::Xml(err.to_string())
    }
}

impl From<image::ImageError> for OverlayError {
    fn from(err: image::ImageError) -> Self {
        OverlayError::Render(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OverlayError>;
