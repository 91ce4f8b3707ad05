use std::error::Error as StdError;

use thiserror::Error;

use crate::application::repos::RepoError;

/// Coarse classification of a failed thread read, for callers that map errors to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    QueryFailed,
}

#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("{operation} failed for {scope}: {source}")]
    QueryFailed {
        operation: &'static str,
        scope: String,
        /// Validated options the failing query ran with.
        options: String,
        #[source]
        source: RepoError,
    },
}

impl ThreadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ThreadError::QueryFailed { .. } => ErrorKind::QueryFailed,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ThreadError::QueryFailed {
                source: RepoError::Timeout,
                ..
            }
        )
    }
}

/// The error and every source below it, outermost first.
pub fn error_chain(error: &dyn StdError) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut current = error.source();
    while let Some(inner) = current {
        messages.push(inner.to_string());
        current = inner.source();
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_failure_carries_context_and_source() {
        let err = ThreadError::QueryFailed {
            operation: "comments.page",
            scope: "post:1".to_string(),
            options: "page=1 limit=20".to_string(),
            source: RepoError::Persistence("connection reset".to_string()),
        };

        assert_eq!(err.kind(), ErrorKind::QueryFailed);
        assert!(!err.is_timeout());
        assert_eq!(
            error_chain(&err),
            [
                "comments.page failed for post:1: persistence error: connection reset",
                "persistence error: connection reset",
            ]
        );
    }
}
