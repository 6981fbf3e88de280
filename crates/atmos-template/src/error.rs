//! Error types for atmos-template

/// Result type for atmos-template operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A template failed to parse or render. `file` names the manifest the
    /// expression came from; the message carries Tera's line context.
    #[error("template render failed in {file}: {message}")]
    Render { file: String, message: String },
}

impl Error {
    pub fn render(file: impl Into<String>, source: &tera::Error) -> Self {
        // Tera chains the useful detail in the error source
        let mut message = source.to_string();
        let mut cause: Option<&dyn std::error::Error> = std::error::Error::source(source);
        while let Some(err) = cause {
            message.push_str(": ");
            message.push_str(&err.to_string());
            cause = err.source();
        }
        Self::Render {
            file: file.into(),
            message,
        }
    }
}
