use std::error::Error as StdError;

use crate::types::{ChannelId, MessageId};

/// Crate-wide result type for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed relay errors.
///
/// Per-destination failures never escape a fan-out; they are reported to the
/// caller only through [`crate::engine::FanOutReport`] and the logs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Destination channel is inaccessible or no longer exists.
    #[error("channel unavailable: {channel_id}: {message}")]
    ChannelUnavailable {
        channel_id: ChannelId,
        message: String,
    },

    /// The platform refused to create or reuse a relay identity.
    #[error("relay identity provisioning failed for channel {channel_id}: {message}")]
    IdentityProvisionFailed {
        channel_id: ChannelId,
        message: String,
    },

    /// A recorded copy no longer exists on the platform.
    #[error("copy not found: message {message_id} in channel {channel_id}")]
    CopyNotFound {
        channel_id: ChannelId,
        message_id: MessageId,
    },

    /// The durable store could not be reached.
    #[error("storage unavailable: {message}")]
    StorageUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// A single attachment could not be fetched for re-upload.
    #[error("attachment fetch failed: {filename}: {message}")]
    AttachmentFetchFailed { filename: String, message: String },

    /// No link matches the given name.
    #[error("link '{name}' doesn't exist")]
    UnknownLink { name: String },

    /// The channel is not a member of the named link.
    #[error("channel {channel_id} is not linked in '{name}'")]
    NotLinked { name: String, channel_id: ChannelId },

    /// Input payload or parameter is invalid.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Wrapped source error from an external dependency.
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn channel_unavailable(channel_id: ChannelId, message: impl std::fmt::Display) -> Self {
        Self::ChannelUnavailable {
            channel_id,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn identity_provision_failed(
        channel_id: ChannelId,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::IdentityProvisionFailed {
            channel_id,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn copy_not_found(channel_id: ChannelId, message_id: MessageId) -> Self {
        Self::CopyNotFound {
            channel_id,
            message_id,
        }
    }

    #[must_use]
    pub fn storage_unavailable(message: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable {
            message: message.to_string(),
            source: None,
        }
    }

    #[must_use]
    pub fn attachment_fetch_failed(
        filename: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::AttachmentFetchFailed {
            filename: filename.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_link(name: impl Into<String>) -> Self {
        Self::UnknownLink { name: name.into() }
    }

    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn is_copy_not_found(&self) -> bool {
        matches!(self, Self::CopyNotFound { .. })
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::StorageUnavailable {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::StorageUnavailable {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_not_found_is_classified() {
        let channel = ChannelId(7);
        assert!(Error::copy_not_found(channel, MessageId(1)).is_copy_not_found());
        assert!(!Error::channel_unavailable(channel, "gone").is_copy_not_found());
    }

    #[test]
    fn sqlx_errors_map_to_storage_unavailable() {
        let err: Error = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, Error::StorageUnavailable { .. }));
    }
}
