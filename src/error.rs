// Error taxonomy shared by every component.
// Variants map to transport status codes at the server boundary only.

/// Discriminated error kind for all fallible operations.
///
/// `Validation` and `NotFound` are the caller's fault and carry the
/// diagnostic message the client needs; `Store` is any underlying
/// persistence failure and is surfaced to clients as an opaque server
/// error, never retried and never translated into partial success.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or missing input, rejected before touching durable state.
    #[error("{0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Underlying persistence failure.
    #[error("store error: {source}")]
    Store {
        #[from]
        source: rusqlite::Error,
    },
}

impl Error {
    /// Shorthand for a validation failure with a diagnostic message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// The canonical unknown-user error.
    pub fn user_not_found() -> Self {
        Error::NotFound("User not found".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_displays_bare_message() {
        let err = Error::validation("sum must be a positive number");
        assert_eq!(err.to_string(), "sum must be a positive number");
    }

    #[test]
    fn store_wraps_rusqlite_error() {
        let err: Error = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, Error::Store { .. }));
        assert!(err.to_string().starts_with("store error:"));
    }
}
