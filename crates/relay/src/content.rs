//! Forwardable payload preparation.

use tracing::debug;

use crate::{
    platform::RelayPlatform,
    types::{Attachment, Embed, Upload},
};

/// Colour of the synthesized "Reply to" embed (dark grey).
pub const DEFAULT_REPLY_COLOUR: u32 = 0x607D8B;

/// Re-fetch every attachment as a new upload. Attachments that fail to fetch
/// are dropped; the rest still go out.
pub async fn prepare_uploads<P: RelayPlatform + ?Sized>(
    platform: &P,
    attachments: &[Attachment],
) -> Vec<Upload> {
    let mut uploads = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        match platform.fetch_attachment(attachment).await {
            Ok(upload) => uploads.push(upload),
            Err(e) => {
                debug!(filename = %attachment.filename, error = %e, "dropping attachment");
            },
        }
    }
    uploads
}

/// Keep only rich embeds, then append a reply summary when `reply_url` is set.
pub fn prepare_embeds(embeds: &[Embed], reply_url: Option<&str>, reply_colour: u32) -> Vec<Embed> {
    let mut prepared: Vec<Embed> = embeds.iter().filter(|e| e.is_rich()).cloned().collect();
    if let Some(url) = reply_url {
        prepared.push(Embed::reply_summary(url, reply_colour));
    }
    prepared
}
