//! End-to-end relay behaviour against the in-memory platform and store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chanlink_relay::{
    Attachment, ChannelId, Embed, EngineConfig, Emoji, Error, InboundMessage, LinkAdmin,
    LinkAdminStore, Membership, MessageDelete, MessageEdit, MessageId, ReactionAdd, RelayEngine,
    platform_memory::InMemoryPlatform, store_memory::InMemoryStore,
};

struct Relay {
    store: Arc<InMemoryStore>,
    platform: Arc<InMemoryPlatform>,
    engine: Arc<RelayEngine<InMemoryPlatform>>,
}

/// Build an engine over `links`, each a name and its member channels, and
/// load the index.
async fn relay_with(links: &[(&str, &[u64])], config: EngineConfig) -> Relay {
    let store = Arc::new(InMemoryStore::new());
    let platform = Arc::new(InMemoryPlatform::new());
    for (name, channels) in links {
        let link = store.create_link(name).await.unwrap();
        for &channel in *channels {
            platform.add_channel(ChannelId(channel));
            store
                .add_membership(Membership {
                    link_id: link.id,
                    channel_id: ChannelId(channel),
                })
                .await
                .unwrap();
        }
    }
    let engine = Arc::new(RelayEngine::new(
        Arc::clone(&platform),
        store.clone(),
        config,
    ));
    engine.reload_links().await.unwrap();
    Relay {
        store,
        platform,
        engine,
    }
}

async fn relay(links: &[(&str, &[u64])]) -> Relay {
    relay_with(links, EngineConfig::default()).await
}

fn user_message(platform: &InMemoryPlatform, channel: u64, content: &str) -> InboundMessage {
    InboundMessage {
        id: platform.post_as_user(ChannelId(channel), content),
        channel_id: ChannelId(channel),
        author_name: "alice".into(),
        author_avatar_url: Some("https://cdn.example/avatars/alice.png".into()),
        content: content.into(),
        ..Default::default()
    }
}

fn copy_in(report: &chanlink_relay::FanOutReport, channel: u64) -> MessageId {
    report
        .posted
        .iter()
        .find(|(c, _)| *c == ChannelId(channel))
        .map(|(_, m)| *m)
        .expect("copy posted")
}

fn thumbs_up(message_id: MessageId, channel: u64, total: u64) -> ReactionAdd {
    ReactionAdd {
        channel_id: ChannelId(channel),
        message_id,
        emoji: Emoji::Unicode("👍".into()),
        reaction_total: total,
        by_relay: false,
    }
}

#[tokio::test]
async fn message_is_mirrored_into_every_other_member() {
    let r = relay(&[("study", &[1, 2, 3])]).await;
    r.platform
        .add_file("https://cdn.example/a.png", b"png-bytes".to_vec());

    let mut message = user_message(&r.platform, 1, "hello");
    message.attachments.push(Attachment {
        filename: "a.png".into(),
        url: "https://cdn.example/a.png".into(),
        spoiler: false,
    });

    let report = r.engine.on_message(&message).await;
    assert_eq!(report.posted.len(), 2);
    assert!(report.skipped.is_empty());

    for channel in [2, 3] {
        let copy = r.platform.message(copy_in(&report, channel)).unwrap();
        assert_eq!(copy.content, "hello");
        assert_eq!(copy.username.as_deref(), Some("alice"));
        assert_eq!(
            copy.avatar_url.as_deref(),
            Some("https://cdn.example/avatars/alice.png")
        );
        assert!(copy.identity_id.is_some());
        assert!(copy.suppress_mentions);
        assert_eq!(copy.uploads.len(), 1);
        assert_eq!(copy.uploads[0].data, b"png-bytes");
    }

    // Never echoed back into the origin channel.
    assert_eq!(r.platform.messages_in(ChannelId(1)).len(), 1);

    let correlation = r.engine.correlation_for(message.id).await.unwrap();
    assert_eq!(correlation.len(), 3);
    let via_copy = r
        .engine
        .correlation_for(copy_in(&report, 3))
        .await
        .unwrap();
    assert_eq!(via_copy, correlation);
}

#[tokio::test]
async fn replies_carry_a_summary_and_drop_non_rich_embeds() {
    let r = relay(&[("study", &[1, 2])]).await;
    let mut message = user_message(&r.platform, 1, "see above");
    message.reply_url = Some("https://discord.com/channels/9/1/77".into());
    message.embeds.push(Embed {
        kind: Some("link".into()),
        description: Some("unfurl".into()),
        ..Default::default()
    });

    let report = r.engine.on_message(&message).await;
    let copy = r.platform.message(copy_in(&report, 2)).unwrap();
    assert_eq!(copy.embeds.len(), 1);
    assert_eq!(
        copy.embeds[0].description.as_deref(),
        Some("Reply to https://discord.com/channels/9/1/77")
    );
}

#[tokio::test]
async fn relayed_and_unlinked_messages_are_ignored() {
    let r = relay(&[("study", &[1, 2])]).await;
    r.platform.add_channel(ChannelId(50));

    let mut echo = user_message(&r.platform, 2, "from a relay identity");
    echo.from_relay = true;
    assert!(r.engine.on_message(&echo).await.is_empty());

    let unlinked = user_message(&r.platform, 50, "nobody listens");
    assert!(r.engine.on_message(&unlinked).await.is_empty());

    assert_eq!(r.platform.messages_in(ChannelId(1)).len(), 0);
    assert!(r.engine.correlation_for(echo.id).await.is_none());
}

#[tokio::test]
async fn destinations_shared_by_several_links_get_one_copy() {
    let r = relay(&[("a", &[1, 2]), ("b", &[1, 2, 3])]).await;
    let message = user_message(&r.platform, 1, "once");

    let report = r.engine.on_message(&message).await;
    assert_eq!(report.posted.len(), 2);
    assert_eq!(r.platform.messages_in(ChannelId(2)).len(), 1);
    assert_eq!(r.platform.messages_in(ChannelId(3)).len(), 1);
}

#[tokio::test]
async fn edit_propagates_and_drops_vanished_copies() {
    let r = relay(&[("study", &[1, 2, 3])]).await;
    let message = user_message(&r.platform, 1, "draft");
    let report = r.engine.on_message(&message).await;
    let copy_b = copy_in(&report, 2);
    let copy_c = copy_in(&report, 3);

    assert!(r.platform.delete_externally(copy_c));

    let edited = r
        .engine
        .on_message_edit(&MessageEdit {
            before_id: message.id,
            after_id: message.id,
            channel_id: ChannelId(1),
            content: "final".into(),
            ..Default::default()
        })
        .await;
    assert_eq!(edited, 1);

    let b = r.platform.message(copy_b).unwrap();
    assert_eq!(b.content, "final");
    assert_eq!(b.edits, 1);

    let correlation = r.engine.correlation_for(message.id).await.unwrap();
    assert_eq!(correlation.len(), 2);
    assert!(correlation.iter().all(|c| c.message_id != copy_c));
}

#[tokio::test]
async fn edit_moves_the_correlation_to_the_new_id() {
    let r = relay(&[("study", &[1, 2])]).await;
    let message = user_message(&r.platform, 1, "draft");
    r.engine.on_message(&message).await;

    let after = MessageId(900_000);
    r.engine
        .on_message_edit(&MessageEdit {
            before_id: message.id,
            after_id: after,
            channel_id: ChannelId(1),
            content: "moved".into(),
            ..Default::default()
        })
        .await;

    assert!(r.engine.correlation_for(message.id).await.is_none());
    let correlation = r.engine.correlation_for(after).await.unwrap();
    assert!(correlation.iter().any(|c| c.message_id == after && !c.relayed));
}

#[tokio::test]
async fn edit_of_uncorrelated_message_is_a_noop() {
    let r = relay(&[("study", &[1, 2])]).await;
    let stray = user_message(&r.platform, 1, "never relayed");
    let edited = r
        .engine
        .on_message_edit(&MessageEdit {
            before_id: stray.id,
            after_id: stray.id,
            channel_id: ChannelId(1),
            content: "still not".into(),
            ..Default::default()
        })
        .await;
    assert_eq!(edited, 0);
}

#[tokio::test]
async fn deleting_the_origin_deletes_every_copy() {
    let r = relay(&[("study", &[1, 2, 3])]).await;
    let message = user_message(&r.platform, 1, "oops");
    let report = r.engine.on_message(&message).await;

    assert!(r.platform.delete_externally(message.id));
    let deleted = r
        .engine
        .on_message_delete(&MessageDelete {
            channel_id: ChannelId(1),
            message_id: message.id,
        })
        .await;

    assert_eq!(deleted, 2);
    assert!(r.platform.message(copy_in(&report, 2)).is_none());
    assert!(r.platform.message(copy_in(&report, 3)).is_none());
    assert!(r.engine.correlation_for(message.id).await.is_none());
}

#[tokio::test]
async fn deleting_a_copy_deletes_the_origin_too() {
    let r = relay(&[("study", &[1, 2, 3])]).await;
    let message = user_message(&r.platform, 1, "oops");
    let report = r.engine.on_message(&message).await;
    let copy_b = copy_in(&report, 2);

    assert!(r.platform.delete_externally(copy_b));
    let deleted = r
        .engine
        .on_message_delete(&MessageDelete {
            channel_id: ChannelId(2),
            message_id: copy_b,
        })
        .await;

    assert_eq!(deleted, 2);
    assert!(r.platform.message(message.id).is_none());
    assert!(r.platform.message(copy_in(&report, 3)).is_none());

    // A second deletion event for the same family finds nothing to do.
    let again = r
        .engine
        .on_message_delete(&MessageDelete {
            channel_id: ChannelId(3),
            message_id: copy_in(&report, 3),
        })
        .await;
    assert_eq!(again, 0);
}

#[tokio::test]
async fn only_the_first_reaction_is_mirrored() {
    let r = relay(&[("study", &[1, 2, 3])]).await;
    let message = user_message(&r.platform, 1, "react to me");
    let report = r.engine.on_message(&message).await;
    let copy_b = copy_in(&report, 2);

    assert_eq!(r.engine.on_reaction_add(&thumbs_up(copy_b, 2, 1)).await, 2);
    let origin = r.platform.message(message.id).unwrap();
    assert_eq!(origin.reactions, vec![Emoji::Unicode("👍".into())]);
    assert_eq!(
        r.platform
            .message(copy_in(&report, 3))
            .unwrap()
            .reactions
            .len(),
        1
    );
    // The reacted message itself is left alone.
    assert!(r.platform.message(copy_b).unwrap().reactions.is_empty());

    assert_eq!(r.engine.on_reaction_add(&thumbs_up(copy_b, 2, 2)).await, 0);

    let mut own = thumbs_up(message.id, 1, 1);
    own.by_relay = true;
    assert_eq!(r.engine.on_reaction_add(&own).await, 0);
}

#[tokio::test]
async fn evicted_correlations_make_handlers_silent() {
    let config = EngineConfig {
        forward_capacity: 1,
        reverse_capacity: 3,
        ..Default::default()
    };
    let r = relay_with(&[("study", &[1, 2, 3])], config).await;

    let first = user_message(&r.platform, 1, "first");
    let first_report = r.engine.on_message(&first).await;
    let second = user_message(&r.platform, 1, "second");
    r.engine.on_message(&second).await;

    assert!(r.engine.correlation_for(first.id).await.is_none());
    let edit = MessageEdit {
        before_id: first.id,
        after_id: first.id,
        channel_id: ChannelId(1),
        content: "late edit".into(),
        ..Default::default()
    };
    assert_eq!(r.engine.on_message_edit(&edit).await, 0);
    assert_eq!(
        r.engine
            .on_message_delete(&MessageDelete {
                channel_id: ChannelId(1),
                message_id: first.id,
            })
            .await,
        0
    );
    assert_eq!(r.engine.on_reaction_add(&thumbs_up(first.id, 1, 1)).await, 0);

    // The untracked copies are left exactly as they were.
    let copy = r.platform.message(copy_in(&first_report, 2)).unwrap();
    assert_eq!(copy.content, "first");
    assert!(r.engine.correlation_for(second.id).await.is_some());
}

#[tokio::test]
async fn failed_reload_keeps_the_previous_index() {
    let r = relay(&[("study", &[1, 2])]).await;
    let link_id = r.engine.links_for(ChannelId(1)).await[0];

    r.store.set_unavailable(true);
    let err = r.engine.reload_links().await.unwrap_err();
    assert!(matches!(err, Error::StorageUnavailable { .. }));
    assert_eq!(r.engine.channels_for(link_id).await, vec![
        ChannelId(1),
        ChannelId(2)
    ]);

    // Cached identities keep the relay working while storage is down.
    let message = user_message(&r.platform, 1, "still here");
    assert_eq!(r.engine.on_message(&message).await.posted.len(), 1);
}

#[tokio::test]
async fn destinations_without_identity_are_skipped() {
    let store = Arc::new(InMemoryStore::new());
    let platform = Arc::new(InMemoryPlatform::new());
    let link = store.create_link("study").await.unwrap();
    for channel in [1, 2, 3] {
        platform.add_channel(ChannelId(channel));
        store
            .add_membership(Membership {
                link_id: link.id,
                channel_id: ChannelId(channel),
            })
            .await
            .unwrap();
    }
    platform.refuse_identities_in(ChannelId(3));
    let engine = RelayEngine::new(
        Arc::clone(&platform),
        store.clone(),
        EngineConfig::default(),
    );

    // Provisioning failures during reload are not fatal.
    engine.reload_links().await.unwrap();
    assert!(store.binding(ChannelId(3)).is_none());

    let message = user_message(&platform, 1, "partial");
    let report = engine.on_message(&message).await;
    assert_eq!(report.posted.len(), 1);
    assert_eq!(report.skipped, vec![ChannelId(3)]);
    assert_eq!(engine.correlation_for(message.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn nothing_is_recorded_when_every_destination_fails() {
    let r = relay(&[("study", &[1, 2])]).await;
    r.platform.reject_posts_in(ChannelId(2));

    let message = user_message(&r.platform, 1, "into the void");
    let report = r.engine.on_message(&message).await;
    assert!(report.posted.is_empty());
    assert_eq!(report.skipped, vec![ChannelId(2)]);
    assert!(r.engine.correlation_for(message.id).await.is_none());
}

#[tokio::test]
async fn deleted_destination_channel_is_skipped() {
    let r = relay(&[("study", &[1, 2, 3])]).await;
    r.platform.remove_channel(ChannelId(3));

    let message = user_message(&r.platform, 1, "hi");
    let report = r.engine.on_message(&message).await;
    assert_eq!(report.posted.len(), 1);
    assert_eq!(report.skipped, vec![ChannelId(3)]);
}

#[tokio::test]
async fn concurrent_events_provision_one_identity_per_channel() {
    let store = Arc::new(InMemoryStore::new());
    let platform = Arc::new(InMemoryPlatform::new());
    let link = store.create_link("study").await.unwrap();
    for channel in [1, 2, 3] {
        platform.add_channel(ChannelId(channel));
        store
            .add_membership(Membership {
                link_id: link.id,
                channel_id: ChannelId(channel),
            })
            .await
            .unwrap();
    }
    let engine = Arc::new(RelayEngine::new(
        Arc::clone(&platform),
        store.clone(),
        EngineConfig::default(),
    ));
    engine.reload_links().await.unwrap();

    let first = user_message(&platform, 1, "one");
    let second = user_message(&platform, 2, "two");
    let e1 = Arc::clone(&engine);
    let e2 = Arc::clone(&engine);
    let (a, b) = tokio::join!(
        tokio::spawn(async move { e1.on_message(&first).await }),
        tokio::spawn(async move { e2.on_message(&second).await }),
    );
    assert_eq!(a.unwrap().posted.len(), 2);
    assert_eq!(b.unwrap().posted.len(), 2);
    assert_eq!(platform.created_identities().len(), 3);
}

#[tokio::test]
async fn concurrent_identity_requests_create_one_identity() {
    let store = Arc::new(InMemoryStore::new());
    let platform = Arc::new(InMemoryPlatform::new());
    platform.add_channel(ChannelId(7));
    let engine = RelayEngine::new(
        Arc::clone(&platform),
        store.clone(),
        EngineConfig::default(),
    );

    let (a, b, c) = tokio::join!(
        engine.identity_for(ChannelId(7)),
        engine.identity_for(ChannelId(7)),
        engine.identity_for(ChannelId(7)),
    );
    assert_eq!(a.unwrap(), b.unwrap());
    assert!(c.is_ok());
    assert_eq!(platform.created_identities().len(), 1);
    assert!(store.binding(ChannelId(7)).is_some());
}

#[tokio::test]
async fn restarted_engine_reuses_stored_identities() {
    let r = relay(&[("study", &[1, 2])]).await;
    assert_eq!(r.platform.created_identities().len(), 2);

    let restarted = RelayEngine::new(
        Arc::clone(&r.platform),
        r.store.clone(),
        EngineConfig::default(),
    );
    restarted.reload_links().await.unwrap();
    assert_eq!(r.platform.created_identities().len(), 2);

    let message = user_message(&r.platform, 2, "after restart");
    assert_eq!(restarted.on_message(&message).await.posted.len(), 1);
}

#[tokio::test]
async fn unlinked_channels_stop_relaying_after_reload() {
    let r = relay(&[("study", &[1, 2, 3])]).await;
    let link_id = r.engine.links_for(ChannelId(1)).await[0];
    r.store
        .remove_membership(Membership {
            link_id,
            channel_id: ChannelId(3),
        })
        .await
        .unwrap();
    r.engine.reload_links().await.unwrap();

    let message = user_message(&r.platform, 1, "smaller");
    let report = r.engine.on_message(&message).await;
    assert_eq!(report.posted.len(), 1);
    assert_eq!(r.platform.messages_in(ChannelId(3)).len(), 0);

    let from_removed = user_message(&r.platform, 3, "anyone?");
    assert!(r.engine.on_message(&from_removed).await.is_empty());
}

#[tokio::test]
async fn failed_edits_keep_the_copy_correlated() {
    let r = relay(&[("study", &[1, 2, 3])]).await;
    let message = user_message(&r.platform, 1, "draft");
    let report = r.engine.on_message(&message).await;
    let copy_b = copy_in(&report, 2);
    let copy_c = copy_in(&report, 3);
    r.platform.reject_edits_in(ChannelId(3));

    let edited = r
        .engine
        .on_message_edit(&MessageEdit {
            before_id: message.id,
            after_id: message.id,
            channel_id: ChannelId(1),
            content: "final".into(),
            ..Default::default()
        })
        .await;
    assert_eq!(edited, 1);
    assert_eq!(r.platform.message(copy_b).unwrap().content, "final");
    assert_eq!(r.platform.message(copy_c).unwrap().content, "draft");

    let correlation = r.engine.correlation_for(message.id).await.unwrap();
    assert_eq!(correlation.len(), 3);
    assert!(correlation.iter().any(|c| c.message_id == copy_c));
    assert!(r.engine.correlation_for(copy_c).await.is_some());
}

#[tokio::test]
async fn failed_deletion_does_not_stop_the_others() {
    let r = relay(&[("study", &[1, 2, 3])]).await;
    let message = user_message(&r.platform, 1, "oops");
    let report = r.engine.on_message(&message).await;
    r.platform.reject_deletes_in(ChannelId(2));

    assert!(r.platform.delete_externally(message.id));
    let deleted = r
        .engine
        .on_message_delete(&MessageDelete {
            channel_id: ChannelId(1),
            message_id: message.id,
        })
        .await;

    assert_eq!(deleted, 1);
    assert!(r.platform.message(copy_in(&report, 2)).is_some());
    assert!(r.platform.message(copy_in(&report, 3)).is_none());
}

#[tokio::test]
async fn failed_reaction_does_not_stop_the_others() {
    let r = relay(&[("study", &[1, 2, 3])]).await;
    let message = user_message(&r.platform, 1, "react to me");
    let report = r.engine.on_message(&message).await;
    r.platform.reject_reactions_in(ChannelId(2));

    assert_eq!(
        r.engine
            .on_reaction_add(&thumbs_up(message.id, 1, 1))
            .await,
        1
    );
    assert!(
        r.platform
            .message(copy_in(&report, 2))
            .unwrap()
            .reactions
            .is_empty()
    );
    assert_eq!(
        r.platform.message(copy_in(&report, 3)).unwrap().reactions,
        vec![Emoji::Unicode("👍".into())]
    );
}

#[tokio::test]
async fn only_mirrored_originals_are_origins() {
    let r = relay(&[("study", &[1, 2])]).await;
    let message = user_message(&r.platform, 1, "hello");
    let report = r.engine.on_message(&message).await;
    let stray = user_message(&r.platform, 2, "never relayed");

    assert!(r.engine.is_origin(message.id).await);
    assert!(!r.engine.is_origin(copy_in(&report, 2)).await);
    assert!(!r.engine.is_origin(stray.id).await);
}

#[tokio::test]
async fn links_administered_elsewhere_reach_the_running_engine() {
    let store = Arc::new(InMemoryStore::new());
    let platform = Arc::new(InMemoryPlatform::new());
    for channel in [1, 2] {
        platform.add_channel(ChannelId(channel));
    }
    let running = RelayEngine::new(
        Arc::clone(&platform),
        store.clone(),
        EngineConfig::default(),
    );
    running.reload_links().await.unwrap();

    // A second engine over the same store, as the `links` command builds.
    let admin_engine = Arc::new(RelayEngine::new(
        Arc::clone(&platform),
        store.clone(),
        EngineConfig::default(),
    ));
    let admin = LinkAdmin::new(store.clone(), admin_engine);
    admin
        .link("study", &[ChannelId(1), ChannelId(2)])
        .await
        .unwrap();

    let message = user_message(&platform, 1, "hello");
    assert_eq!(running.on_message(&message).await.posted.len(), 1);
    // The running engine reuses the identities the admin side stored.
    assert_eq!(platform.created_identities().len(), 2);

    admin.unlink("study", Some(ChannelId(2))).await.unwrap();
    assert!(running.refresh_links().await.unwrap());
    assert!(!running.refresh_links().await.unwrap());

    let later = user_message(&platform, 1, "alone now");
    assert!(running.on_message(&later).await.is_empty());
}
