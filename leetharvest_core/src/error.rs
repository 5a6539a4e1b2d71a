use std::error::Error as StdError;

/// Common error type for `leetharvest_core`.
///
/// Transport and storage failures preserve the underlying error chain via
/// `Error::transport` / `Error::storage`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("graphql error: {0}")]
    Protocol(String),

    #[error("storage error: {context}")]
    Storage {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    #[tracing::instrument(level = "debug", name = "leetharvest.error.transport", skip(source))]
    pub fn transport(
        context: impl Into<String> + std::fmt::Debug,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[tracing::instrument(level = "debug", name = "leetharvest.error.storage", skip(source))]
    pub fn storage(
        context: impl Into<String> + std::fmt::Debug,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
