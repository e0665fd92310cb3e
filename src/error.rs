use thiserror::Error;

/// Fieldless view of [`LoadError`] for matching without borrowing payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PartialFetch,
    Timeout,
    MalformedData,
    Fetch,
    Io,
    Json,
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("dataset \"{0}\" not found in datasets.json")]
    NotFound(String),

    #[error("no file available to compile the dataset ({attempted} attempted)")]
    PartialFetch { attempted: usize },

    #[error("TIMEOUT after {0} ms")]
    Timeout(u64),

    #[error("malformed data at {url}: expected {expected}")]
    MalformedData { url: String, expected: &'static str },

    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LoadError {
    pub fn fetch(url: impl ToString, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::NotFound(_) => ErrorKind::NotFound,
            LoadError::PartialFetch { .. } => ErrorKind::PartialFetch,
            LoadError::Timeout(_) => ErrorKind::Timeout,
            LoadError::MalformedData { .. } => ErrorKind::MalformedData,
            LoadError::Fetch { .. } => ErrorKind::Fetch,
            LoadError::Io(_) => ErrorKind::Io,
            LoadError::Json(_) => ErrorKind::Json,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Only unknown ids and total fetch failure are shown to the user;
    /// everything else degrades to an empty display.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound | ErrorKind::PartialFetch | ErrorKind::Fetch
        )
    }
}

pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(LoadError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(LoadError::Timeout(10).kind(), ErrorKind::Timeout);
        assert_eq!(
            LoadError::PartialFetch { attempted: 3 }.kind(),
            ErrorKind::PartialFetch
        );
    }

    #[test]
    fn test_visibility() {
        assert!(LoadError::NotFound("x".into()).is_user_visible());
        assert!(LoadError::PartialFetch { attempted: 2 }.is_user_visible());
        assert!(!LoadError::Timeout(5000).is_user_visible());
        assert!(!LoadError::MalformedData {
            url: "u".into(),
            expected: "array"
        }
        .is_user_visible());
    }

    #[test]
    fn test_timeout_message_carries_marker() {
        let msg = LoadError::Timeout(5000).to_string();
        assert!(msg.starts_with("TIMEOUT"));
    }
}
