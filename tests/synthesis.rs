mod support;

use std::time::Duration;

use melo_reader::application::{
    nonce::NonceError,
    settings::UpdateTtsSettingsCommand,
    synthesis::{CacheStatus, SynthesisError},
    tts::TtsError,
};
use melo_reader::domain::entities::DEFAULT_API_ENDPOINT;
use support::{FAKE_AUDIO, FakeReply, FakeTts, Harness};

#[tokio::test]
async fn first_request_calls_tts_once_and_stores_one_file() {
    let harness = Harness::new(FakeTts::new(FakeReply::Audio));
    let post_id = harness
        .store
        .insert_post("Hello", "<p>World   Wide</p>")
        .await;

    let outcome = harness
        .synthesis
        .synthesize(post_id, &harness.token())
        .await
        .expect("synthesized");

    assert_eq!(outcome.cache, CacheStatus::Generated);
    assert_eq!(harness.tts.calls(), 1);

    let files = harness.stored_files();
    assert_eq!(files.len(), 1);
    assert_eq!(std::fs::read(&files[0]).expect("read audio"), FAKE_AUDIO);

    let file_name = files[0]
        .file_name()
        .and_then(|name| name.to_str())
        .expect("file name");
    assert!(file_name.starts_with(&format!("melo-tts-{post_id}-")));
    assert!(file_name.ends_with(".wav"));
    assert!(outcome.audio_url.starts_with("/uploads/"));
    assert!(outcome.audio_url.ends_with(file_name));

    assert_eq!(
        harness.store.audio_url(post_id).await.as_deref(),
        Some(outcome.audio_url.as_str())
    );
}

#[tokio::test]
async fn request_text_is_title_then_collapsed_body() {
    let harness = Harness::new(FakeTts::new(FakeReply::Audio));
    let post_id = harness
        .store
        .insert_post("Hello", "<p>World   Wide</p>")
        .await;

    harness
        .synthesis
        .synthesize(post_id, &harness.token())
        .await
        .expect("synthesized");

    let requests = harness.tts.requests().await;
    assert_eq!(requests.len(), 1);
    let (endpoint, request) = &requests[0];
    assert_eq!(endpoint, DEFAULT_API_ENDPOINT);
    assert_eq!(request.text, "Hello. World Wide");
    assert_eq!(request.language, "KR");
    assert_eq!(request.speaker, "KR");
}

#[tokio::test]
async fn cached_audio_is_reused_without_calling_tts() {
    let harness = Harness::new(FakeTts::new(FakeReply::Audio));
    let post_id = harness.store.insert_post("Cached", "<p>body</p>").await;

    let first = harness
        .synthesis
        .synthesize(post_id, &harness.token())
        .await
        .expect("first");
    let second = harness
        .synthesis
        .synthesize(post_id, &harness.token())
        .await
        .expect("second");

    assert_eq!(second.cache, CacheStatus::Hit);
    assert_eq!(second.audio_url, first.audio_url);
    assert_eq!(harness.tts.calls(), 1);
    assert_eq!(harness.stored_files().len(), 1);
}

#[tokio::test]
async fn removed_audio_file_is_regenerated() {
    let harness = Harness::new(FakeTts::new(FakeReply::Audio));
    let post_id = harness.store.insert_post("Gone", "<p>body</p>").await;

    let first = harness
        .synthesis
        .synthesize(post_id, &harness.token())
        .await
        .expect("first");
    for file in harness.stored_files() {
        std::fs::remove_file(file).expect("remove audio");
    }

    let second = harness
        .synthesis
        .synthesize(post_id, &harness.token())
        .await
        .expect("second");

    assert_eq!(second.cache, CacheStatus::Generated);
    assert_eq!(harness.tts.calls(), 2);
    assert_eq!(harness.stored_files().len(), 1);
    assert_eq!(
        harness.store.audio_url(post_id).await.as_deref(),
        Some(second.audio_url.as_str())
    );
    assert!(
        harness
            .storage
            .stored_path_for_url(&first.audio_url)
            .is_some()
    );
}

#[tokio::test]
async fn long_posts_are_cut_at_the_character_limit() {
    let harness = Harness::new(FakeTts::new(FakeReply::Audio));
    let body = format!("<p>{}</p>", "가나다 ".repeat(2_000));
    let post_id = harness.store.insert_post("긴 글", &body).await;

    harness
        .synthesis
        .synthesize(post_id, &harness.token())
        .await
        .expect("synthesized");

    let expected: String = format!("긴 글. {}", "가나다 ".repeat(2_000).trim())
        .chars()
        .take(5_000)
        .collect();
    let requests = harness.tts.requests().await;
    assert_eq!(requests[0].1.text.chars().count(), 5_000);
    assert_eq!(requests[0].1.text, expected);
}

#[tokio::test]
async fn configured_limit_is_respected() {
    let harness = Harness::with_max_chars(FakeTts::new(FakeReply::Audio), 8);
    let post_id = harness.store.insert_post("Title", "<p>Body text</p>").await;

    harness
        .synthesis
        .ensure_audio(post_id)
        .await
        .expect("synthesized");

    assert_eq!(harness.tts.requests().await[0].1.text, "Title. B");
}

#[tokio::test]
async fn invalid_token_is_rejected_before_any_work() {
    let harness = Harness::new(FakeTts::new(FakeReply::Audio));
    let post_id = harness.store.insert_post("Locked", "<p>body</p>").await;

    let err = harness
        .synthesis
        .synthesize(post_id, "0123456789abcdef0123")
        .await
        .expect_err("bad token");
    assert!(matches!(err, SynthesisError::Auth(NonceError::Invalid)));

    let err = harness
        .synthesis
        .synthesize(post_id, "")
        .await
        .expect_err("missing token");
    assert!(matches!(err, SynthesisError::Auth(NonceError::Missing)));

    let other_action = harness.nonces.issue("some_other_action");
    let err = harness
        .synthesis
        .synthesize(post_id, &other_action)
        .await
        .expect_err("token for another action");
    assert!(matches!(err, SynthesisError::Auth(NonceError::Invalid)));

    assert_eq!(harness.tts.calls(), 0);
    assert!(harness.store.audio_url(post_id).await.is_none());
}

#[tokio::test]
async fn invalid_token_for_unknown_post_is_still_an_auth_error() {
    let harness = Harness::new(FakeTts::new(FakeReply::Audio));

    let err = harness
        .synthesis
        .synthesize(999, "not-a-token")
        .await
        .expect_err("bad token");
    assert!(matches!(err, SynthesisError::Auth(_)));
}

#[tokio::test]
async fn unknown_post_is_not_found() {
    let harness = Harness::new(FakeTts::new(FakeReply::Audio));

    let err = harness
        .synthesis
        .synthesize(42, &harness.token())
        .await
        .expect_err("missing post");

    assert!(matches!(err, SynthesisError::PostNotFound { post_id: 42 }));
    assert_eq!(harness.tts.calls(), 0);
}

#[tokio::test]
async fn tts_error_status_leaves_no_cache_and_no_file() {
    let harness = Harness::new(FakeTts::new(FakeReply::Status(503)));
    let post_id = harness.store.insert_post("Down", "<p>body</p>").await;

    let err = harness
        .synthesis
        .synthesize(post_id, &harness.token())
        .await
        .expect_err("tts failure");

    assert!(matches!(
        err,
        SynthesisError::Transport(TtsError::Status { status: 503, .. })
    ));
    assert!(err.to_string().starts_with("TTS generation failed:"));
    assert!(harness.store.audio_url(post_id).await.is_none());
    assert!(harness.stored_files().is_empty());
}

#[tokio::test]
async fn tts_timeout_leaves_no_cache_and_is_retried_on_next_request() {
    let harness = Harness::new(FakeTts::new(FakeReply::Timeout));
    let post_id = harness.store.insert_post("Slow", "<p>body</p>").await;

    for _ in 0..2 {
        let err = harness
            .synthesis
            .synthesize(post_id, &harness.token())
            .await
            .expect_err("timeout");
        assert!(matches!(
            err,
            SynthesisError::Transport(TtsError::Timeout { .. })
        ));
    }

    assert_eq!(harness.tts.calls(), 2);
    assert!(harness.store.audio_url(post_id).await.is_none());
    assert!(harness.stored_files().is_empty());
}

#[tokio::test]
async fn stored_settings_drive_the_request() {
    let harness = Harness::new(FakeTts::new(FakeReply::Audio));
    harness
        .settings
        .update(UpdateTtsSettingsCommand {
            endpoint: " http://tts.internal:5000/ ".to_string(),
            language: "EN".to_string(),
            speaker: "EN-US".to_string(),
        })
        .await
        .expect("settings saved");
    let post_id = harness.store.insert_post("Hi", "<p>there</p>").await;

    harness
        .synthesis
        .synthesize(post_id, &harness.token())
        .await
        .expect("synthesized");

    let requests = harness.tts.requests().await;
    let (endpoint, request) = &requests[0];
    assert_eq!(endpoint, "http://tts.internal:5000/");
    assert_eq!(request.language, "EN");
    assert_eq!(request.speaker, "EN-US");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_requests_make_a_single_tts_call() {
    let harness =
        Harness::new(FakeTts::new(FakeReply::Audio).with_delay(Duration::from_millis(100)));
    let post_id = harness.store.insert_post("Busy", "<p>body</p>").await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let synthesis = harness.synthesis.clone();
        let token = harness.token();
        handles.push(tokio::spawn(async move {
            synthesis.synthesize(post_id, &token).await
        }));
    }

    let mut urls = Vec::new();
    for handle in handles {
        let outcome = handle.await.expect("join").expect("synthesized");
        urls.push(outcome.audio_url);
    }

    assert_eq!(harness.tts.calls(), 1);
    assert!(urls.iter().all(|url| url == &urls[0]));
    assert_eq!(harness.stored_files().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_posts_are_generated_independently() {
    let harness =
        Harness::new(FakeTts::new(FakeReply::Audio).with_delay(Duration::from_millis(50)));
    let first = harness.store.insert_post("One", "<p>a</p>").await;
    let second = harness.store.insert_post("Two", "<p>b</p>").await;

    let (a, b) = tokio::join!(
        harness.synthesis.ensure_audio(first),
        harness.synthesis.ensure_audio(second)
    );

    assert_ne!(a.expect("first").audio_url, b.expect("second").audio_url);
    assert_eq!(harness.tts.calls(), 2);
}
