use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Discord(#[from] serenity::Error),

    #[error(transparent)]
    Relay(#[from] chanlink_relay::Error),

    #[error("not a Discord webhook url: {url}")]
    InvalidWebhookUrl { url: String },
}

pub type Result<T> = std::result::Result<T, Error>;
