// File: artistbot-core/tests/command_tests.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use artistbot_common::models::{ChatId, MediaInfo, PlaybackEvent};
use artistbot_core::playback::{SessionRegistry, SessionSettings};
use artistbot_core::resolver::MediaResolver;
use artistbot_core::services::{CommandContext, CommandService};
use artistbot_core::test_utils::{FakeBackend, RecordingMessenger, RecordingTransport, TEST_CALL};

struct Harness {
    service: CommandService,
    registry: Arc<SessionRegistry>,
    transport: Arc<RecordingTransport>,
    messenger: Arc<RecordingMessenger>,
    dir: tempfile::TempDir,
}

fn media(id: &str, title: &str, duration: u64) -> MediaInfo {
    MediaInfo {
        id: id.to_string(),
        title: Some(title.to_string()),
        duration_secs: Some(duration),
        ext: Some("m4a".into()),
        url: None,
    }
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(
        FakeBackend::new()
            .with_media("song a", media("aaa", "Song A", 5))
            .with_media("song b", media("bbb", "Song B", 3)),
    );
    let transport = Arc::new(RecordingTransport::new());
    let messenger = Arc::new(RecordingMessenger::default());
    let registry = Arc::new(SessionRegistry::new(transport.clone(), SessionSettings::default()));
    let resolver = Arc::new(MediaResolver::new(backend, dir.path()));
    let service = CommandService::new(registry.clone(), resolver, messenger.clone(), "/");
    Harness {
        service,
        registry,
        transport,
        messenger,
        dir,
    }
}

fn in_call(chat: u64) -> CommandContext {
    CommandContext {
        chat_id: ChatId(chat),
        requester: "alice".into(),
        call_target: Some(TEST_CALL),
        reply_text: None,
    }
}

fn no_call(chat: u64) -> CommandContext {
    CommandContext {
        call_target: None,
        ..in_call(chat)
    }
}

async fn reply(h: &Harness, ctx: &CommandContext, line: &str) -> String {
    let resp = h
        .service
        .handle_chat_line(ctx, line)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("no reply to {line:?}"));
    assert_eq!(resp.chat_id, ctx.chat_id);
    resp.texts.join("\n")
}

#[tokio::test]
async fn ignores_plain_text_and_unknown_commands() {
    let h = harness();
    let ctx = in_call(1);
    assert!(h.service.handle_chat_line(&ctx, "hello there").await.unwrap().is_none());
    assert!(h.service.handle_chat_line(&ctx, "/dance").await.unwrap().is_none());
    assert!(h.service.handle_chat_line(&ctx, "").await.unwrap().is_none());
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn start_lists_the_commands() {
    let h = harness();
    let text = reply(&h, &in_call(1), "/start").await;
    for cmd in ["/play", "/pause", "/resume", "/skip", "/nowplaying", "/seek"] {
        assert!(text.contains(cmd), "missing {cmd} in {text}");
    }
    assert_eq!(reply(&h, &in_call(1), "/help").await, text);
}

#[tokio::test]
async fn play_validates_query_and_call() {
    let h = harness();
    assert_eq!(
        reply(&h, &in_call(1), "/play").await,
        "Usage: /play <url or search query>"
    );
    assert_eq!(
        reply(&h, &no_call(1), "/play song a").await,
        "Join a voice channel first, then try again."
    );
    assert!(h.messenger.sent().is_empty());
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn bare_play_in_a_reply_uses_the_quoted_text() {
    let h = harness();
    let quoting = |text: &str| CommandContext {
        reply_text: Some(text.to_string()),
        ..in_call(8)
    };

    let card = reply(&h, &quoting("  song b "), "/play").await;
    assert!(card.contains("Title: Song B"), "{card}");

    // Explicit arguments win over the quoted message.
    let card = reply(&h, &quoting("song b"), "/play song a").await;
    assert!(card.contains("Title: Song A"), "{card}");

    assert_eq!(
        reply(&h, &quoting("   "), "/play").await,
        "Usage: /play <url or search query>"
    );
}

#[tokio::test]
async fn a_lost_status_message_does_not_drop_the_request() {
    let h = harness();
    let service = Arc::new(h.service);
    h.messenger.fail_next(1);

    service
        .spawn_dispatch(in_call(11), "/play song a".into())
        .await
        .unwrap();

    // Song A holds for 5s, so its consumer is still busy with it.
    let session = h.registry.get(ChatId(11)).unwrap();
    assert!(session.consumer_running());
    assert_eq!(h.messenger.attempts(), 2);
    let sent = h.messenger.texts_for(ChatId(11));
    assert_eq!(sent.len(), 1, "{sent:?}");
    assert!(sent[0].contains("Title: Song A"), "{sent:?}");
}

#[tokio::test]
async fn failed_resolution_leaves_the_queue_alone() {
    let h = harness();
    let text = reply(&h, &in_call(1), "/play something obscure").await;
    assert!(text.starts_with("❌ Failed to play:"), "{text}");

    let session = h.registry.get(ChatId(1)).unwrap();
    assert!(session.queue().is_empty());
    assert!(!session.consumer_running());
    assert_eq!(
        h.messenger.texts_for(ChatId(1)),
        vec!["🔎 Searching and downloading...".to_string()]
    );
}

#[tokio::test]
async fn controls_on_an_idle_chat_explain_themselves() {
    let h = harness();
    let ctx = in_call(4);
    assert_eq!(reply(&h, &ctx, "/pause").await, "Error: nothing is playing right now");
    assert_eq!(reply(&h, &ctx, "/resume").await, "Error: nothing is playing right now");
    assert_eq!(reply(&h, &ctx, "/skip").await, "Error: nothing is playing right now");
    assert_eq!(reply(&h, &ctx, "/nowplaying").await, "No song is playing right now.");
    assert_eq!(reply(&h, &ctx, "/queue").await, "Queue is empty.");
}

#[tokio::test]
async fn seek_validates_then_declines() {
    let h = harness();
    let ctx = in_call(6);
    assert_eq!(reply(&h, &ctx, "/seek").await, "Usage: /seek <seconds>");
    assert_eq!(reply(&h, &ctx, "/seek soon").await, "Provide seconds as integer");
    assert_eq!(reply(&h, &ctx, "/seek 30").await, "Nothing playing");
}

/// Two requests in chat 42: A (5s) then B (3s). A streams first, B only
/// after A's hold, and the transport ends up idle.
#[tokio::test]
async fn two_requests_play_back_to_back() {
    let h = harness();
    let mut events = h.registry.subscribe();
    let ctx = in_call(42);

    let card = reply(&h, &ctx, "/play song a").await;
    assert!(card.contains("position 1"), "{card}");
    assert!(card.contains("Title: Song A"));
    assert!(card.contains("Duration: 00:05"));
    assert!(card.contains("Requested by: alice"));

    let card = reply(&h, &ctx, "/play@ArtistBot song b").await;
    assert!(card.contains("Title: Song B"), "{card}");

    tokio::time::pause();
    sleep(Duration::from_millis(500)).await;
    let now = reply(&h, &ctx, "/nowplaying").await;
    assert!(now.contains("Title: Song A"), "{now}");
    let queue = reply(&h, &ctx, "/queue").await;
    assert!(queue.contains("1. Song B (00:03) - alice"), "{queue}");
    assert!(reply(&h, &ctx, "/seek 10").await.contains("isn't supported"));

    sleep(Duration::from_secs(5)).await;
    assert!(reply(&h, &ctx, "/nowplaying").await.contains("Title: Song B"));

    sleep(Duration::from_secs(3)).await;
    assert_eq!(reply(&h, &ctx, "/nowplaying").await, "No song is playing right now.");

    assert_eq!(
        h.transport.joined_sources(),
        vec![h.dir.path().join("aaa.m4a"), h.dir.path().join("bbb.m4a")]
    );
    assert_eq!(h.transport.leave_count(), 2);

    let mut started = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PlaybackEvent::TrackStarted { track, .. } = event {
            started.push(track.title().to_string());
        }
    }
    assert_eq!(started, vec!["Song A", "Song B"]);
}

#[tokio::test]
async fn a_bound_call_is_reused_by_later_requests() {
    let h = harness();
    reply(&h, &in_call(9), "/play song a").await;
    let session = h.registry.get(ChatId(9)).unwrap();
    assert_eq!(session.call_target().await, Some(TEST_CALL));

    let card = reply(&h, &no_call(9), "/play song b").await;
    assert!(card.contains("Title: Song B"), "{card}");
}

#[tokio::test]
async fn dispatch_posts_replies_through_the_messenger() {
    let h = harness();
    let service = Arc::new(h.service);
    service
        .spawn_dispatch(in_call(3), "/queue".into())
        .await
        .unwrap();
    assert_eq!(
        h.messenger.texts_for(ChatId(3)),
        vec!["Queue is empty.".to_string()]
    );
}
