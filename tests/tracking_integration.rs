//! Identity resolution and tracking pipeline integration tests.
//!
//! These exercise the reconciliation engine end-to-end against in-memory
//! SQLite: exact matching, fuzzy session migration, session-window resets,
//! and exclusion handling.

use footfall::registry::{ExclusionRegistry, ExclusionSource, SqliteExclusionSource};
use footfall::storage::{SqliteVisitorStore, VisitorStore};
use footfall::tracking::{
    IdentityResolver, PageRequest, TrackOutcome, TrackingProcessor, FUZZY_WINDOW_SECS,
};
use std::sync::Arc;

const NOW: i64 = 1_700_000_000;

async fn setup() -> (
    Arc<dyn VisitorStore>,
    Arc<dyn ExclusionSource>,
    TrackingProcessor,
) {
    let sqlite = SqliteVisitorStore::new("sqlite::memory:", 1).await.unwrap();
    let pool = sqlite.pool();
    let store: Arc<dyn VisitorStore> = Arc::new(sqlite);
    store.init().await.unwrap();

    let source = SqliteExclusionSource::new(pool);
    source.init().await.unwrap();
    let source: Arc<dyn ExclusionSource> = Arc::new(source);

    let registry = ExclusionRegistry::new(Arc::clone(&source), vec!["/media/".to_string()]);
    let processor = TrackingProcessor::new(Arc::clone(&store), registry);

    (store, source, processor)
}

fn page(session_key: &str, ip: &str, ua: &str, path: &str) -> PageRequest {
    PageRequest {
        session_key: session_key.to_string(),
        ip_address: ip.to_string(),
        user_agent: ua.to_string(),
        path: path.to_string(),
        referrer: Some("https://referrer.example/start".to_string()),
        user_id: None,
        background: false,
    }
}

#[tokio::test]
async fn sequential_requests_accumulate_on_one_record() {
    let (store, _, processor) = setup().await;
    let request = page("s1", "1.2.3.4", "UA-X", "/blog/");

    for i in 0..5 {
        processor.track(&request, NOW + i).await.unwrap();
    }

    let all = store.find_active_since(0).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].page_views, 5);
    assert_eq!(all[0].last_update, Some(NOW + 4));
    // referrer and session_start are set once, on the first request
    assert_eq!(
        all[0].referrer.as_deref(),
        Some("https://referrer.example/start")
    );
    assert_eq!(all[0].session_start, NOW);
}

#[tokio::test]
async fn rotated_session_key_within_window_adopts_record() {
    let (store, _, processor) = setup().await;

    processor
        .track(&page("old-key", "1.2.3.4", "UA-X", "/a/"), NOW)
        .await
        .unwrap();

    // Four minutes later the cookie was reissued; same device kept browsing
    let outcome = processor
        .track(&page("new-key", "1.2.3.4", "UA-X", "/b/"), NOW + 4 * 60)
        .await
        .unwrap();

    let TrackOutcome::Tracked(visitor) = outcome else {
        panic!("request should have been tracked");
    };
    assert_eq!(visitor.session_key, "new-key");
    assert_eq!(visitor.page_views, 2);

    // The old key is gone; no duplicate record was created
    assert!(store
        .find_by_session_and_ip("old-key", "1.2.3.4")
        .await
        .unwrap()
        .is_none());
    assert_eq!(store.find_active_since(0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn rotated_session_key_outside_window_creates_new_record() {
    let (store, _, processor) = setup().await;

    processor
        .track(&page("old-key", "1.2.3.4", "UA-X", "/a/"), NOW)
        .await
        .unwrap();

    // Six minutes later is past the migration window
    processor
        .track(&page("new-key", "1.2.3.4", "UA-X", "/b/"), NOW + 6 * 60)
        .await
        .unwrap();

    let all = store.find_active_since(0).await.unwrap();
    assert_eq!(all.len(), 2);

    let fresh = store
        .find_by_session_and_ip("new-key", "1.2.3.4")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.page_views, 1);
}

#[tokio::test]
async fn different_user_agent_never_fuzzy_matches() {
    let (store, _, processor) = setup().await;

    processor
        .track(&page("old-key", "1.2.3.4", "UA-X", "/a/"), NOW)
        .await
        .unwrap();
    processor
        .track(&page("new-key", "1.2.3.4", "UA-Y", "/b/"), NOW + 60)
        .await
        .unwrap();

    assert_eq!(store.find_active_since(0).await.unwrap().len(), 2);
}

#[tokio::test]
async fn hour_of_inactivity_restarts_session_window() {
    let (store, _, processor) = setup().await;

    processor
        .track(&page("s1", "1.2.3.4", "UA-X", "/a/"), NOW)
        .await
        .unwrap();
    processor
        .track(&page("s1", "1.2.3.4", "UA-X", "/b/"), NOW + 30 * 60)
        .await
        .unwrap();

    // 61 minutes after the last request: page views reset, referrer recaptured
    let mut comeback = page("s1", "1.2.3.4", "UA-X", "/c/");
    comeback.referrer = Some("https://search.example/q=footfall".to_string());
    let later = NOW + 30 * 60 + 61 * 60;
    processor.track(&comeback, later).await.unwrap();

    let visitor = store
        .find_by_session_and_ip("s1", "1.2.3.4")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(visitor.page_views, 1);
    assert_eq!(
        visitor.referrer.as_deref(),
        Some("https://search.example/q=footfall")
    );
    assert_eq!(visitor.session_start, later);
    assert_eq!(visitor.url, "/c/");
}

#[tokio::test]
async fn referrer_is_sticky_within_session_window() {
    let (store, _, processor) = setup().await;

    processor
        .track(&page("s1", "1.2.3.4", "UA-X", "/a/"), NOW)
        .await
        .unwrap();

    let mut second = page("s1", "1.2.3.4", "UA-X", "/b/");
    second.referrer = Some("https://elsewhere.example/".to_string());
    processor.track(&second, NOW + 10 * 60).await.unwrap();

    let visitor = store
        .find_by_session_and_ip("s1", "1.2.3.4")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(visitor.page_views, 2);
    assert_eq!(
        visitor.referrer.as_deref(),
        Some("https://referrer.example/start")
    );
}

#[tokio::test]
async fn excluded_prefix_touches_nothing() {
    let (store, source, processor) = setup().await;
    source.add_path_prefix("/feeds/").await.unwrap();

    let outcome = processor
        .track(&page("s1", "1.2.3.4", "UA-X", "/feeds/rss/"), NOW)
        .await
        .unwrap();
    assert!(matches!(outcome, TrackOutcome::Excluded));

    // Static deployment prefixes apply too
    let outcome = processor
        .track(&page("s1", "1.2.3.4", "UA-X", "/media/logo.png"), NOW)
        .await
        .unwrap();
    assert!(matches!(outcome, TrackOutcome::Excluded));

    assert!(store.find_active_since(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn excluded_agent_keyword_touches_nothing() {
    let (store, source, processor) = setup().await;
    source.add_agent_keyword("Googlebot").await.unwrap();

    let outcome = processor
        .track(
            &page("s1", "1.2.3.4", "Mozilla/5.0 (compatible; Googlebot/2.1)", "/"),
            NOW,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, TrackOutcome::Excluded));
    assert!(store.find_active_since(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn background_request_is_skipped() {
    let (store, _, processor) = setup().await;

    let mut request = page("s1", "1.2.3.4", "UA-X", "/");
    request.background = true;

    let outcome = processor.track(&request, NOW).await.unwrap();
    assert!(matches!(outcome, TrackOutcome::Skipped));
    assert!(store.find_active_since(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn sessionless_requests_share_one_record_per_ip() {
    let (store, _, processor) = setup().await;

    processor
        .track(&page("", "1.2.3.4", "UA-X", "/a/"), NOW)
        .await
        .unwrap();
    processor
        .track(&page("", "1.2.3.4", "UA-X", "/b/"), NOW + 1)
        .await
        .unwrap();

    let visitor = store
        .find_by_session_and_ip("", "1.2.3.4")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(visitor.page_views, 2);
}

#[tokio::test]
async fn resolver_window_boundaries() {
    let (store, _, processor) = setup().await;
    processor
        .track(&page("old-key", "1.2.3.4", "UA-X", "/"), NOW)
        .await
        .unwrap();

    let resolver = IdentityResolver::new(Arc::clone(&store));

    // Exactly at the edge of the window the record is still adopted
    let adopted = resolver
        .resolve("new-key", "1.2.3.4", "UA-X", NOW + FUZZY_WINDOW_SECS)
        .await
        .unwrap();
    assert!(adopted.id.is_some());
    assert_eq!(adopted.session_key, "new-key");

    // One second past it a fresh record comes back instead
    let fresh = resolver
        .resolve("new-key", "1.2.3.4", "UA-X", NOW + FUZZY_WINDOW_SECS + 1)
        .await
        .unwrap();
    assert!(fresh.id.is_none());
    assert_eq!(fresh.page_views, 0);
}

#[tokio::test]
async fn authenticated_user_is_recorded() {
    let (store, _, processor) = setup().await;

    let mut request = page("s1", "1.2.3.4", "UA-X", "/");
    request.user_id = Some("alice".to_string());
    processor.track(&request, NOW).await.unwrap();

    let visitor = store
        .find_by_session_and_ip("s1", "1.2.3.4")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(visitor.user_id.as_deref(), Some("alice"));

    // Logging out drops the association on the next request
    let mut anonymous = page("s1", "1.2.3.4", "UA-X", "/");
    anonymous.user_id = None;
    processor.track(&anonymous, NOW + 1).await.unwrap();

    let visitor = store
        .find_by_session_and_ip("s1", "1.2.3.4")
        .await
        .unwrap()
        .unwrap();
    assert!(visitor.user_id.is_none());
}
