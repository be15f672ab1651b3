//! Webhook-backed [`RelayPlatform`] over serenity's HTTP client.
//!
//! Every linked channel gets one bot-owned webhook; mirrored copies are posted
//! through it with the original author's name and avatar.

use std::{future::Future, sync::Arc};

#[cfg(feature = "metrics")]
use std::time::Instant;

use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    serenity::{
        all::{
            self as discord, CreateAllowedMentions, CreateAttachment, CreateWebhook,
            EditWebhookMessage, ExecuteWebhook, Http, Webhook, WebhookId,
        },
        http::HttpError,
    },
    tracing::{debug, info},
};

#[cfg(feature = "metrics")]
use chanlink_metrics::{counter, discord as discord_metrics, histogram, labels};

use chanlink_relay::{
    Attachment, ChannelId, CopyRef, CopyUpdate, Emoji, Error, IdentityBinding, MessageId,
    OutboundPost, RelayPlatform, Result, Upload,
};

use crate::{convert, webhook::parse_webhook_url};

/// HTTP status of a failed Discord request, if it got that far.
fn status_of(err: &serenity::Error) -> Option<u16> {
    match err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) => {
            Some(resp.status_code.as_u16())
        },
        _ => None,
    }
}

fn is_not_found(err: &serenity::Error) -> bool {
    status_of(err) == Some(404)
}

/// Time a REST call and count its failures.
async fn observe<T, F>(operation: &'static str, call: F) -> serenity::Result<T>
where
    F: Future<Output = serenity::Result<T>>,
{
    #[cfg(feature = "metrics")]
    let started = Instant::now();

    let result = call.await;

    #[cfg(feature = "metrics")]
    {
        histogram!(discord_metrics::API_CALL_DURATION_SECONDS, labels::OPERATION => operation)
            .record(started.elapsed().as_secs_f64());
        if result.is_err() {
            counter!(discord_metrics::API_CALL_ERRORS_TOTAL, labels::OPERATION => operation)
                .increment(1);
        }
    }

    if let Err(e) = &result {
        debug!(operation, status = ?status_of(e), error = %e, "discord request failed");
    }
    result
}

fn snowflake_channel(channel_id: ChannelId) -> discord::ChannelId {
    discord::ChannelId::new(channel_id.get())
}

fn snowflake_message(message_id: MessageId) -> discord::MessageId {
    discord::MessageId::new(message_id.get())
}

fn no_mentions() -> CreateAllowedMentions {
    CreateAllowedMentions::new()
}

pub struct DiscordPlatform {
    http: Arc<Http>,
    client: reqwest::Client,
    identity_name: String,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>, identity_name: impl Into<String>) -> Self {
        Self {
            http,
            client: reqwest::Client::new(),
            identity_name: identity_name.into(),
        }
    }

    pub fn http(&self) -> &Http {
        &self.http
    }

    /// Binding for a webhook url pasted by an administrator.
    pub fn binding_from_url(url: &str) -> crate::Result<IdentityBinding> {
        let (id, token) = parse_webhook_url(url)?;
        Ok(IdentityBinding::new(id, token))
    }
}

#[async_trait]
impl RelayPlatform for DiscordPlatform {
    type Identity = Webhook;

    async fn resolve_identity(
        &self,
        channel_id: ChannelId,
        binding: &IdentityBinding,
    ) -> Result<Webhook> {
        let webhook = observe(
            "resolve_webhook",
            Webhook::from_id_with_token(
                self.http(),
                WebhookId::new(binding.identity_id),
                binding.credential.expose_secret(),
            ),
        )
        .await
        .map_err(|e| match status_of(&e) {
            Some(403) => Error::channel_unavailable(channel_id, e),
            _ => Error::identity_provision_failed(channel_id, e),
        })?;

        if webhook.channel_id != Some(snowflake_channel(channel_id)) {
            return Err(Error::identity_provision_failed(
                channel_id,
                format!("webhook {} posts into another channel", webhook.id),
            ));
        }
        Ok(webhook)
    }

    async fn create_identity(&self, channel_id: ChannelId) -> Result<(Webhook, IdentityBinding)> {
        let webhook = observe(
            "create_webhook",
            snowflake_channel(channel_id)
                .create_webhook(self.http(), CreateWebhook::new(self.identity_name.as_str())),
        )
        .await
        .map_err(|e| {
            if is_not_found(&e) {
                Error::channel_unavailable(channel_id, e)
            } else {
                Error::identity_provision_failed(channel_id, e)
            }
        })?;

        let url = webhook
            .url()
            .map_err(|e| Error::identity_provision_failed(channel_id, e))?;
        let (identity_id, token) = parse_webhook_url(&url)
            .map_err(|e| Error::identity_provision_failed(channel_id, e))?;

        info!(%channel_id, webhook_id = identity_id, "created relay webhook");
        #[cfg(feature = "metrics")]
        counter!(discord_metrics::WEBHOOKS_CREATED_TOTAL).increment(1);

        Ok((webhook, IdentityBinding::new(identity_id, token)))
    }

    async fn fetch_attachment(&self, attachment: &Attachment) -> Result<Upload> {
        let fetch = async {
            self.client
                .get(&attachment.url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await
        };
        let data = fetch
            .await
            .map_err(|e| Error::attachment_fetch_failed(attachment.filename.clone(), e))?;
        Ok(Upload {
            filename: attachment.filename.clone(),
            data: data.to_vec(),
            spoiler: attachment.spoiler,
        })
    }

    async fn send_as(
        &self,
        identity: &Webhook,
        channel_id: ChannelId,
        post: &OutboundPost,
    ) -> Result<MessageId> {
        let mut builder = ExecuteWebhook::new()
            .content(post.content.as_str())
            .username(convert::webhook_username(&post.username))
            .embeds(post.embeds.iter().map(convert::create_embed).collect())
            .add_files(post.uploads.iter().map(|u| {
                CreateAttachment::bytes(
                    u.data.clone(),
                    convert::upload_filename(&u.filename, u.spoiler),
                )
            }));
        if let Some(avatar_url) = &post.avatar_url {
            builder = builder.avatar_url(avatar_url.as_str());
        }
        if post.suppress_mentions {
            builder = builder.allowed_mentions(no_mentions());
        }

        let posted = observe("execute_webhook", identity.execute(self.http(), true, builder))
            .await
            .map_err(|e| Error::channel_unavailable(channel_id, e))?;
        posted
            .map(|m| convert::message_id(m.id))
            .ok_or_else(|| Error::channel_unavailable(channel_id, "webhook returned no message"))
    }

    async fn edit_copy(
        &self,
        copy: &CopyRef,
        identity: Option<&Webhook>,
        update: &CopyUpdate,
    ) -> Result<MessageId> {
        let Some(webhook) = identity else {
            return Err(Error::invalid_input(format!(
                "message {} was not posted by the relay and cannot be edited",
                copy.message_id
            )));
        };
        let builder = EditWebhookMessage::new()
            .content(update.content.as_str())
            .embeds(update.embeds.iter().map(convert::create_embed).collect())
            .allowed_mentions(no_mentions());

        let edited = observe(
            "edit_webhook_message",
            webhook.edit_message(self.http(), snowflake_message(copy.message_id), builder),
        )
        .await
        .map_err(|e| {
            if is_not_found(&e) {
                Error::copy_not_found(copy.channel_id, copy.message_id)
            } else {
                Error::external("editing relayed copy", e)
            }
        })?;
        Ok(convert::message_id(edited.id))
    }

    async fn delete_copy(&self, copy: &CopyRef, identity: Option<&Webhook>) -> Result<()> {
        let message_id = snowflake_message(copy.message_id);
        let result = match identity {
            Some(webhook) => {
                observe(
                    "delete_webhook_message",
                    webhook.delete_message(self.http(), None, message_id),
                )
                .await
            },
            None => {
                observe(
                    "delete_message",
                    snowflake_channel(copy.channel_id).delete_message(self.http(), message_id),
                )
                .await
            },
        };
        result.map_err(|e| {
            if is_not_found(&e) {
                Error::copy_not_found(copy.channel_id, copy.message_id)
            } else {
                Error::external("deleting copy", e)
            }
        })
    }

    async fn add_reaction(&self, copy: &CopyRef, emoji: &Emoji) -> Result<()> {
        observe(
            "create_reaction",
            snowflake_channel(copy.channel_id).create_reaction(
                self.http(),
                snowflake_message(copy.message_id),
                convert::reaction_type(emoji),
            ),
        )
        .await
        .map_err(|e| {
            if is_not_found(&e) {
                Error::copy_not_found(copy.channel_id, copy.message_id)
            } else {
                Error::external("adding reaction", e)
            }
        })
    }
}
