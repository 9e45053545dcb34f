use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use jobportal_backend::{
    database::{listing_store::ListingStore, memory_store::MemoryListingStore},
    models::listing::{Counters, Listing, ListingDetails, ListingKind},
    routes::{self, RouterOptions},
    services::{
        cache_service::MemoryCacheSlot, event_service::NoopEventSink,
        listing_service::ListingSettings,
    },
    AppState,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

struct TestApp {
    app: Router,
    store: Arc<MemoryListingStore>,
    _dir: tempfile::TempDir,
}

fn test_app() -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryListingStore::new());
    let state = AppState::new(
        store.clone(),
        Arc::new(MemoryCacheSlot::new()),
        Arc::new(NoopEventSink),
        ListingSettings::default(),
        &[ListingKind::Drives],
        dir.path(),
    );
    let app = routes::app(
        state,
        RouterOptions {
            public_rps: 1000,
            admin_rps: 1000,
            jwt_secret: "test_secret_key".into(),
        },
    );
    TestApp {
        app,
        store,
        _dir: dir,
    }
}

fn exam(id: &str, added: i64, level: &str) -> Listing {
    Listing {
        id: id.into(),
        kind: ListingKind::Exams,
        title: format!("{} exam", level),
        organization: "Commission".into(),
        description: None,
        location: Some("All India".into()),
        category: Some(level.into()),
        application_start_date: None,
        application_end_date: None,
        date: Some("2025-08-01".into()),
        added_timestamp: added,
        updated_at: None,
        featured: false,
        is_new: false,
        is_active: true,
        counters: Counters::default(),
        details: ListingDetails::empty_for(ListingKind::Exams),
    }
}

async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, JsonValue) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let body = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn category_filter_returns_matching_exams() {
    let t = test_app();
    t.store.insert(&exam("e1", 100, "UPSC")).await.unwrap();
    t.store.insert(&exam("e2", 200, "SSC")).await.unwrap();

    let (status, body) = call(&t.app, "GET", "/api/public/exams?category=UPSC").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(1));
    assert_eq!(body["items"][0]["id"], json!("e1"));
    assert_eq!(body["cached"], json!(false));

    let (_, all) = call(&t.app, "GET", "/api/public/exams?category=all").await;
    assert_eq!(all["total"], json!(2));
    assert_eq!(all["items"][0]["id"], json!("e2"));
}

#[tokio::test]
async fn pages_are_one_based_and_out_of_range_is_empty() {
    let t = test_app();
    for i in 0..5 {
        t.store
            .insert(&exam(&format!("e{}", i), 100 + i, "SSC"))
            .await
            .unwrap();
    }

    let (_, page2) = call(&t.app, "GET", "/api/public/exams?page=2&perPage=2").await;
    assert_eq!(page2["totalPages"], json!(3));
    assert_eq!(page2["items"][0]["id"], json!("e2"));

    let (status, far) = call(&t.app, "GET", "/api/public/exams?page=9&perPage=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(far["items"], json!([]));
    assert_eq!(far["total"], json!(5));
}

#[tokio::test]
async fn open_status_uses_application_window() {
    let t = test_app();
    let today = Utc::now().date_naive();
    let mut open = exam("open", 300, "Banking");
    open.application_start_date = Some((today - Duration::days(1)).to_string());
    open.application_end_date = Some((today + Duration::days(5)).to_string());
    let mut closed = exam("closed", 200, "Banking");
    closed.application_start_date = Some("2020-01-01".into());
    closed.application_end_date = Some("2020-01-10".into());
    let mut broken = exam("broken", 100, "Banking");
    broken.application_start_date = Some("soon".into());
    broken.application_end_date = Some("later".into());
    for listing in [&open, &closed, &broken] {
        t.store.insert(listing).await.unwrap();
    }

    let (_, body) = call(&t.app, "GET", "/api/public/exams?status=open").await;
    assert_eq!(body["total"], json!(1));
    assert_eq!(body["items"][0]["id"], json!("open"));
    assert_eq!(body["items"][0]["isOpen"], json!(true));
    assert_eq!(body["items"][0]["daysLeft"], json!(5));

    let (_, body) = call(&t.app, "GET", "/api/public/exams?status=closed").await;
    assert_eq!(body["total"], json!(1));
    assert_eq!(body["items"][0]["id"], json!("closed"));
}

#[tokio::test]
async fn unreachable_store_serves_cached_listings() {
    let t = test_app();
    for (i, level) in ["UPSC", "SSC", "Railway"].iter().enumerate() {
        t.store
            .insert(&exam(&format!("e{}", i), 100 + i as i64, level))
            .await
            .unwrap();
    }
    let (status, _) = call(&t.app, "GET", "/api/public/exams").await;
    assert_eq!(status, StatusCode::OK);

    t.store.set_available(false);
    let (status, body) = call(&t.app, "GET", "/api/public/exams").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], json!(true));
    assert!(body["cachedAt"].is_i64());
    assert_eq!(body["items"].as_array().map(Vec::len), Some(3));

    let (_, health) = call(&t.app, "GET", "/health").await;
    assert_eq!(health["status"], json!("degraded"));
    assert_eq!(health["servingCache"], json!(["exams"]));

    let (status, _) = call(&t.app, "GET", "/api/public/exams?retry=true").await;
    assert_eq!(status, StatusCode::OK);

    t.store.set_available(true);
    let (_, fresh) = call(&t.app, "GET", "/api/public/exams?retry=true").await;
    assert_eq!(fresh["cached"], json!(false));
}

#[tokio::test]
async fn unreachable_store_without_cache_is_an_error() {
    let t = test_app();
    t.store.set_available(false);
    let (status, body) = call(&t.app, "GET", "/api/public/jobs").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn detail_view_counts_and_hides_inactive() {
    let t = test_app();
    t.store.insert(&exam("e1", 100, "UPSC")).await.unwrap();
    let mut gone = exam("e2", 100, "UPSC");
    gone.is_active = false;
    t.store.insert(&gone).await.unwrap();

    let (status, body) = call(&t.app, "GET", "/api/public/listings/e1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["views"], json!(1));
    assert_eq!(body["details"]["type"], json!("exam"));

    let (status, _) = call(&t.app, "GET", "/api/public/listings/e2").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn interactions_bump_counters() {
    let t = test_app();
    t.store.insert(&exam("e1", 100, "UPSC")).await.unwrap();

    let (status, body) = call(&t.app, "POST", "/api/public/listings/e1/share").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counters"]["shares"], json!(1));

    let (_, body) = call(&t.app, "POST", "/api/public/listings/e1/apply").await;
    assert_eq!(body["counters"]["applications"], json!(1));

    let (status, _) = call(&t.app, "POST", "/api/public/listings/e1/like").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_kind_is_rejected() {
    let t = test_app();
    let (status, body) = call(&t.app, "GET", "/api/public/blogs").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("blogs"));
}

#[tokio::test]
async fn facets_list_distinct_values() {
    let t = test_app();
    t.store.insert(&exam("e1", 100, "UPSC")).await.unwrap();
    t.store.insert(&exam("e2", 200, "SSC")).await.unwrap();
    t.store.insert(&exam("e3", 300, "SSC")).await.unwrap();

    let (status, body) = call(&t.app, "GET", "/api/public/exams/facets").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["categories"], json!(["SSC", "UPSC"]));
    assert_eq!(body["organizations"], json!(["Commission"]));
}

#[tokio::test]
async fn local_drives_are_listed_from_disk() {
    let t = test_app();
    let (status, body) = call(&t.app, "GET", "/api/public/drives").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(0));

    // the remote store is not involved for local kinds
    t.store.set_available(false);
    let (status, body) = call(&t.app, "GET", "/api/public/drives").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], json!(false));
}
