//! Integration tests for the fetch module.
//!
//! These tests drive the rate-limited client against a mock WaniKani API.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use indicatif::ProgressBar;
use serde_json::{Value, json};
use tempfile::TempDir;
use wanikani_deck_core::api::{ApiClient, ApiError, ManualClock, RateLimiter};
use wanikani_deck_core::cache::SubjectCache;
use wanikani_deck_core::fetch::{FetchError, LevelRange, RecordFetcher};
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A moment forty seconds into a wall-clock minute.
const START_SECS: u64 = 1_700_000_080;

fn start() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(START_SECS)
}

fn client(server: &MockServer, clock: &Arc<ManualClock>, quota: u32) -> ApiClient {
    let limiter = Arc::new(RateLimiter::with_clock(quota, clock.clone()));
    ApiClient::new(&format!("{}/v2/", server.uri()), "test-token", limiter)
        .expect("client should build")
}

fn fetcher(server: &MockServer, clock: &Arc<ManualClock>) -> RecordFetcher {
    RecordFetcher::new(client(server, clock, 60))
}

fn user_body() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": {"level": 2, "subscription": {"max_level_granted": 60}}
    }))
}

fn subject(id: u64, meaning: &str, audios: Value) -> Value {
    json!({
        "id": id,
        "object": "vocabulary",
        "data": {
            "readings": [{"reading": "よみ", "primary": true}],
            "parts_of_speech": ["noun"],
            "meanings": [{"meaning": meaning, "primary": true}],
            "auxiliary_meanings": [],
            "meaning_mnemonic": "mnemonic",
            "pronunciation_audios": audios
        }
    })
}

fn page(subjects: Vec<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"object": "collection", "data": subjects}))
}

#[tokio::test]
async fn test_fetch_subjects_follows_cursor_and_last_page_wins() {
    let server = MockServer::start().await;
    let clock = Arc::new(ManualClock::starting_at(start()));

    Mock::given(method("GET"))
        .and(path("/v2/subjects"))
        .and(query_param("levels", "1,2"))
        .and(query_param("types", "kana_vocabulary,vocabulary"))
        .and(query_param("hidden", "false"))
        .and(query_param_is_missing("page_after_id"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("wanikani-revision", "20170710"))
        .respond_with(page(vec![
            subject(1, "One", json!([])),
            subject(2, "Old", json!([])),
        ]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/subjects"))
        .and(query_param("page_after_id", "2"))
        .respond_with(page(vec![
            subject(2, "New", json!([])),
            subject(3, "Three", json!([])),
        ]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/subjects"))
        .and(query_param("page_after_id", "3"))
        .respond_with(page(vec![]))
        .expect(1)
        .mount(&server)
        .await;

    let mut subjects = Default::default();
    let stats = fetcher(&server, &clock)
        .fetch_subjects(LevelRange::up_to(2).expect("non-zero"), &mut subjects)
        .await
        .expect("pagination should succeed");

    assert_eq!(stats.pages, 2);
    assert_eq!(stats.subjects, 4);
    assert_eq!(subjects.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(subjects[&2].data.meanings.as_ref().expect("meanings")[0].meaning, "New");
    assert!(clock.sleeps().is_empty(), "no waits within quota");
}

#[tokio::test]
async fn test_fetch_records_merges_into_existing_cache() {
    let server = MockServer::start().await;
    let clock = Arc::new(ManualClock::starting_at(start()));
    let data_dir = TempDir::new().expect("failed to create temp dir");
    let cache = SubjectCache::in_dir(data_dir.path());

    std::fs::write(
        cache.path(),
        serde_json::to_string(&json!({"99": subject(99, "Cached", json!([]))})).expect("json"),
    )
    .expect("seed cache");

    Mock::given(method("GET"))
        .and(path("/v2/subjects"))
        .and(query_param_is_missing("page_after_id"))
        .respond_with(page(vec![subject(1, "One", json!([]))]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/subjects"))
        .and(query_param("page_after_id", "1"))
        .respond_with(page(vec![]))
        .mount(&server)
        .await;

    let subjects = fetcher(&server, &clock)
        .fetch_records(LevelRange::up_to(1).expect("non-zero"), &cache)
        .await
        .expect("fetch should succeed");

    assert_eq!(subjects.keys().copied().collect::<Vec<_>>(), vec![1, 99]);
    assert_eq!(cache.load().expect("cache reloads"), subjects);

    let written = std::fs::read_to_string(cache.path()).expect("read cache");
    assert!(written.contains("\n    \"1\": {"), "four-space indent: {written}");
}

#[tokio::test]
async fn test_download_missing_audio_picks_mp3_and_skips_existing() {
    let server = MockServer::start().await;
    let clock = Arc::new(ManualClock::starting_at(start()));
    let audio_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/audio/10.ogg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ogg".to_vec()))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/audio/10.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3 ten".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/audio/11.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3 eleven".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let uri = server.uri();
    let subjects: wanikani_deck_core::SubjectMap = [
        subject(
            10,
            "Ten",
            json!([
                {"url": format!("{uri}/audio/10.ogg"), "content_type": "audio/ogg"},
                {"url": format!("{uri}/audio/10.mp3"), "content_type": "audio/mpeg"}
            ]),
        ),
        subject(
            11,
            "Eleven",
            json!([{"url": format!("{uri}/audio/11.mp3"), "content_type": "audio/mpeg"}]),
        ),
        subject(
            12,
            "Twelve",
            json!([{"url": format!("{uri}/audio/12.ogg"), "content_type": "audio/ogg"}]),
        ),
    ]
    .into_iter()
    .map(|value| {
        let subject: wanikani_deck_core::Subject =
            serde_json::from_value(value).expect("valid subject");
        (subject.id, subject)
    })
    .collect();

    std::fs::write(audio_dir.path().join("wbvocab-11.mp3"), b"already here")
        .expect("seed audio");

    let stats = fetcher(&server, &clock)
        .download_missing_audio(&subjects, audio_dir.path(), &ProgressBar::hidden())
        .await
        .expect("audio pass should succeed");

    assert_eq!(stats.downloaded, 1);
    assert_eq!(stats.already_present, 1);
    assert_eq!(stats.unavailable, 1);
    assert_eq!(
        std::fs::read(audio_dir.path().join("wbvocab-10.mp3")).expect("downloaded"),
        b"mp3 ten"
    );
    assert_eq!(
        std::fs::read(audio_dir.path().join("wbvocab-11.mp3")).expect("kept"),
        b"already here"
    );
    assert!(!audio_dir.path().join("wbvocab-12.mp3").exists());
}

#[tokio::test]
async fn test_throttled_request_waits_until_rate_limit_reset() {
    let server = MockServer::start().await;
    let clock = Arc::new(ManualClock::starting_at(start()));

    Mock::given(method("GET"))
        .and(path("/v2/user"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("RateLimit-Reset", (START_SECS + 25).to_string().as_str()),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "user",
            "data": {"level": 4, "subscription": {"max_level_granted": 60}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = fetcher(&server, &clock)
        .fetch_user()
        .await
        .expect("retry should succeed");

    assert_eq!(user.level, 4);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(25)]);
}

#[tokio::test]
async fn test_throttled_request_falls_back_to_retry_after() {
    let server = MockServer::start().await;
    let clock = Arc::new(ManualClock::starting_at(start()));

    Mock::given(method("GET"))
        .and(path("/v2/user"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"level": 2, "subscription": {"max_level_granted": 3}}
        })))
        .mount(&server)
        .await;

    fetcher(&server, &clock)
        .fetch_user()
        .await
        .expect("retry should succeed");

    assert_eq!(clock.sleeps(), vec![Duration::from_secs(7)]);
}

#[tokio::test]
async fn test_throttle_retry_cap_gives_up() {
    let server = MockServer::start().await;
    let clock = Arc::new(ManualClock::starting_at(start()));

    Mock::given(method("GET"))
        .and(path("/v2/user"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let client = client(&server, &clock, 60).with_max_throttle_retries(Some(2));

    let result = RecordFetcher::new(client).fetch_user().await;

    assert!(matches!(
        result,
        Err(FetchError::Api(ApiError::Throttled { retries: 2, .. }))
    ));
    // Without reset headers each retry waits for the next minute.
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(20), Duration::from_secs(60)]
    );
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;
    let clock = Arc::new(ManualClock::starting_at(start()));

    Mock::given(method("GET"))
        .and(path("/v2/user"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let result = fetcher(&server, &clock).fetch_user().await;

    assert!(matches!(
        result,
        Err(FetchError::Api(ApiError::HttpStatus { status: 500, .. }))
    ));
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_client_requests_wait_for_next_bucket_when_quota_spent() {
    let server = MockServer::start().await;
    let clock = Arc::new(ManualClock::starting_at(start()));

    Mock::given(method("GET"))
        .and(path("/v2/user"))
        .respond_with(user_body())
        .expect(3)
        .mount(&server)
        .await;

    let client = client(&server, &clock, 2);
    let url = client.endpoint("user").expect("endpoint");
    for _ in 0..3 {
        client.get(&url, &[]).await.expect("request should succeed");
    }

    // Two requests fit the bucket; the third waits out the remaining 20s.
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(20)]);
}

#[tokio::test]
async fn test_audio_downloads_share_the_request_quota() {
    let server = MockServer::start().await;
    let clock = Arc::new(ManualClock::starting_at(start()));

    Mock::given(method("GET"))
        .and(path("/v2/user"))
        .respond_with(user_body())
        .expect(1)
        .mount(&server)
        .await;
    for id in [20, 21] {
        Mock::given(method("GET"))
            .and(path(format!("/audio/{id}.mp3")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let uri = server.uri();
    let subjects: wanikani_deck_core::SubjectMap = [20_u64, 21]
        .into_iter()
        .map(|id| {
            let value = subject(
                id,
                "Audio",
                json!([{"url": format!("{uri}/audio/{id}.mp3"), "content_type": "audio/mpeg"}]),
            );
            let subject: wanikani_deck_core::Subject =
                serde_json::from_value(value).expect("valid subject");
            (id, subject)
        })
        .collect();
    let audio_dir = TempDir::new().expect("failed to create temp dir");

    let fetcher = RecordFetcher::new(client(&server, &clock, 2));
    fetcher.fetch_user().await.expect("user should load");
    assert!(clock.sleeps().is_empty());

    let stats = fetcher
        .download_missing_audio(&subjects, audio_dir.path(), &ProgressBar::hidden())
        .await
        .expect("audio pass should succeed");

    assert_eq!(stats.downloaded, 2);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(20)]);
}
