//! Error codes shared by the relay's collaborator errors.

/// Grepable error code for structured error bodies and log lines.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    /// Source chain below this error, joined with `": "`.
    fn trace(&self) -> Option<String>
    where
        Self: std::error::Error,
    {
        let mut parts = Vec::new();
        let mut source = self.source();
        while let Some(err) = source {
            parts.push(err.to_string());
            source = err.source();
        }
        if parts.is_empty() { None } else { Some(parts.join(": ")) }
    }
}
