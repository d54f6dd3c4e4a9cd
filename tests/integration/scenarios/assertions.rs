//! Assertion helpers end to end over the text client

use crate::integration::{config_for, MockMemcached, MockMemcachedBuilder, ResponseMode};
use memcached_harness::{CacheSession, ClientKind, HarnessError};
use serde_json::{json, Value};

async fn session_for(mock: &MockMemcached) -> CacheSession {
    CacheSession::set_up(&config_for(mock, ClientKind::Text))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_never_written_keys() {
    let mock = MockMemcached::new().await.unwrap();
    let mut session = session_for(&mock).await;
    session.store("written", &1).await.unwrap();

    for key in ["users_count", "user:1", "0", "a-very-long-key-name-for-a-cache-entry"] {
        let err = session.assert_present(key, None).await.unwrap_err();
        assert!(err.is_assertion_failure(), "{} should be absent", key);
        session.assert_absent_or_mismatched(key, None).await.unwrap();
    }

    session.tear_down().await;
    mock.shutdown();
}

#[tokio::test]
async fn test_store_then_grab_returns_equal_values() {
    let mock = MockMemcached::new().await.unwrap();
    let mut session = session_for(&mock).await;

    let values: Vec<(&str, Value)> = vec![
        ("int", json!(200)),
        ("zero", json!(0)),
        ("empty", json!("")),
        ("float", json!(1.5)),
        ("negative", json!(-42)),
        ("text", json!("hello world")),
        ("null", json!(null)),
        ("list", json!([1, "two", {"three": 3}])),
        ("object", json!({"name": "davert", "roles": ["admin"], "active": true})),
    ];

    for (key, value) in &values {
        session.store(key, value).await.unwrap();
    }
    for (key, value) in &values {
        assert_eq!(
            session.grab_value(key).await.unwrap().as_ref(),
            Some(value),
            "round trip of {}",
            key
        );
    }

    session.tear_down().await;
    mock.shutdown();
}

#[tokio::test]
async fn test_assert_present_distinguishes_values() {
    let mock = MockMemcached::new().await.unwrap();
    let mut session = session_for(&mock).await;

    session.store("users_count", &200).await.unwrap();
    session
        .assert_present("users_count", Some(&json!(200)))
        .await
        .unwrap();

    let err = session
        .assert_present("users_count", Some(&json!(201)))
        .await
        .unwrap_err();
    let failure = err.as_assertion_failure().unwrap();
    assert_eq!(failure.key, "users_count");
    assert_eq!(failure.expected, Some(json!(201)));
    assert_eq!(failure.actual, Some(json!(200)));

    session.tear_down().await;
    mock.shutdown();
}

#[tokio::test]
async fn test_absent_or_mismatched_with_stored_value() {
    let mock = MockMemcached::new().await.unwrap();
    let mut session = session_for(&mock).await;

    session.store("users_count", &200).await.unwrap();

    // Same value passes
    session
        .assert_absent_or_mismatched("users_count", Some(&json!(200)))
        .await
        .unwrap();

    // A different value fails: the helper compares for equality
    let err = session
        .assert_absent_or_mismatched("users_count", Some(&json!(300)))
        .await
        .unwrap_err();
    assert!(err.is_assertion_failure());

    // Absent key passes whatever is expected
    session
        .assert_absent_or_mismatched("other_key", Some(&json!(300)))
        .await
        .unwrap();

    session.tear_down().await;
    mock.shutdown();
}

#[tokio::test]
async fn test_expiration_reaches_server() {
    let mock = MockMemcached::new().await.unwrap();
    let mut session = session_for(&mock).await;

    session.store("forever", &1).await.unwrap();
    session
        .store_with_expiration("short_lived", &1, 90)
        .await
        .unwrap();

    assert_eq!(mock.get_stored_exptime("forever"), Some(0));
    assert_eq!(mock.get_stored_exptime("short_lived"), Some(90));
    assert_eq!(mock.get_stored_value("forever"), Some(b"1".to_vec()));

    session.tear_down().await;
    mock.shutdown();
}

#[tokio::test]
async fn test_clear_flushes_mid_test() {
    let mock = MockMemcached::new().await.unwrap();
    let mut session = session_for(&mock).await;

    session.store("users_count", &200).await.unwrap();
    session.clear().await.unwrap();
    session
        .assert_absent_or_mismatched("users_count", None)
        .await
        .unwrap();
    assert_eq!(mock.stats().flushes, 1);

    session.tear_down().await;
    assert_eq!(mock.stats().flushes, 2);
    mock.shutdown();
}

#[tokio::test]
async fn test_foreign_payload_reads_as_string() {
    let mock = MockMemcachedBuilder::new()
        .with_data("legacy", b"plain text")
        .build()
        .await
        .unwrap();
    let mut session = session_for(&mock).await;

    session
        .assert_present("legacy", Some(&json!("plain text")))
        .await
        .unwrap();

    session.tear_down().await;
    mock.shutdown();
}

#[tokio::test]
async fn test_rejected_store_fails_assertion() {
    let mock = MockMemcachedBuilder::new()
        .response_mode(ResponseMode::RejectStores)
        .build()
        .await
        .unwrap();
    let mut session = session_for(&mock).await;

    let err = session.store("users_count", &200).await.unwrap_err();
    assert!(err.is_assertion_failure());
    assert_eq!(mock.get_stored_value("users_count"), None);

    session.tear_down().await;
    mock.shutdown();
}

#[tokio::test]
async fn test_server_error_surfaces_as_client_error() {
    let mock = MockMemcached::new().await.unwrap();
    let mut session = session_for(&mock).await;
    mock.set_response_mode(ResponseMode::ServerError("out of memory".to_string()));

    let err = session.grab_value("users_count").await.unwrap_err();
    assert!(matches!(err, HarnessError::Client(_)));
    assert!(err.to_string().contains("out of memory"));

    // Teardown flush also gets SERVER_ERROR; it must not panic or raise
    session.tear_down().await;
    mock.shutdown();
}

#[tokio::test]
async fn test_invalid_key_is_rejected_before_sending() {
    let mock = MockMemcached::new().await.unwrap();
    let mut session = session_for(&mock).await;

    let err = session.store("two words", &1).await.unwrap_err();
    assert!(matches!(err, HarnessError::Client(_)));
    assert_eq!(mock.stats().requests, 0);

    session.tear_down().await;
    mock.shutdown();
}
