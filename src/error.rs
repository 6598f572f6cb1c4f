use std::fmt;

/// Errors the encoder can raise. Both are surfaced to the HTTP/2
/// connection layer; neither is recoverable inside the encoder itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EncoderError {
    /// A primitive encoder failed to fit at a position where prior
    /// bytes in the same call prohibit partial progress: the status
    /// pseudo-header didn't fit, or strict mode's caller-supplied
    /// buffer couldn't hold even the first header.
    Full,

    /// The header list's total size exceeds the peer's
    /// `SETTINGS_MAX_HEADER_LIST_SIZE`. No dynamic-table mutation has
    /// occurred when this is raised.
    HeaderListTooLarge { limit: usize },
}

impl fmt::Display for EncoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncoderError::Full => write!(f, "HPACK encoding buffer too small to make progress"),
            EncoderError::HeaderListTooLarge { limit } => {
                write!(f, "header list exceeds configured max size of {} bytes", limit)
            }
        }
    }
}

impl std::error::Error for EncoderError {}
