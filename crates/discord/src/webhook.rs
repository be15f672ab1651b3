use url::Url;

use crate::{Error, Result};

const WEBHOOK_HOSTS: &[&str] = &[
    "discord.com",
    "discordapp.com",
    "canary.discord.com",
    "ptb.discord.com",
];

/// Split a webhook url into its id and token.
///
/// Accepts `https://discord.com/api/webhooks/<id>/<token>`, with or without
/// an API version segment (`/api/v10/webhooks/...`).
pub fn parse_webhook_url(raw: &str) -> Result<(u64, String)> {
    let invalid = || Error::InvalidWebhookUrl {
        url: raw.to_string(),
    };
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if url.scheme() != "https" || !url.host_str().is_some_and(|h| WEBHOOK_HOSTS.contains(&h)) {
        return Err(invalid());
    }

    let segments: Vec<&str> = url.path_segments().ok_or_else(invalid)?.collect();
    let rest = match segments.as_slice() {
        ["api", "webhooks", rest @ ..] => rest,
        ["api", version, "webhooks", rest @ ..] if version.starts_with('v') => rest,
        _ => return Err(invalid()),
    };
    let [id, token, ..] = rest else {
        return Err(invalid());
    };
    let id: u64 = id.parse().map_err(|_| invalid())?;
    if id == 0 || token.is_empty() {
        return Err(invalid());
    }
    Ok((id, (*token).to_string()))
}
