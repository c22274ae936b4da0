//! Tests for redirect resolution: terminal states, expiry boundaries,
//! click recording and geolocation fallback.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use shortlink::creation::CreationFlow;
use shortlink::database::init_db;
use shortlink::events::TracingSink;
use shortlink::geo::{DisabledGeoLocator, GeoLocator};
use shortlink::model::{CreateRow, Mapping, Minutes, MINUTE_MS};
use shortlink::resolver::{Resolution, Resolver, Visit};
use shortlink::shortcode::RandomGenerator;
use shortlink::store::MappingStore;

const NOW: i64 = 1_700_000_000_000;

struct FixedGeo(&'static str);

#[async_trait]
impl GeoLocator for FixedGeo {
    async fn country(&self, _client_ip: Option<&str>) -> Option<String> {
        Some(self.0.to_string())
    }
}

/// Never answers within any reasonable timeout
struct StalledGeo;

#[async_trait]
impl GeoLocator for StalledGeo {
    async fn country(&self, _client_ip: Option<&str>) -> Option<String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Some("Nowhere".to_string())
    }
}

fn setup(geo: Arc<dyn GeoLocator>, geo_timeout: Duration) -> (Resolver, MappingStore, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db = init_db(temp_db.path().to_str().unwrap()).expect("Failed to initialize test database");
    let store = MappingStore::new(Arc::new(db));
    let resolver = Resolver::new(store.clone(), geo, Arc::new(TracingSink), geo_timeout);
    (resolver, store, temp_db)
}

fn seed(store: &MappingStore, code: &str, url: &str, minutes: i64) -> Mapping {
    let mapping = Mapping::new(code.to_string(), url.to_string(), minutes, NOW);
    store.upsert(mapping.clone()).unwrap();
    mapping
}

fn visit(referrer: Option<&str>, user_agent: Option<&str>) -> Visit {
    Visit {
        referrer: referrer.map(str::to_string),
        user_agent: user_agent.map(str::to_string),
        client_ip: Some("203.0.113.7".to_string()),
    }
}

#[tokio::test]
async fn test_resolve_valid_shortcode_redirects_and_records_click() {
    let (resolver, store, _temp_db) = setup(Arc::new(FixedGeo("Germany")), Duration::from_secs(1));
    seed(&store, "abc123", "https://example.com", 10);

    let resolution = resolver
        .resolve(
            "abc123",
            visit(Some("https://news.example"), Some("Mozilla/5.0")),
            NOW + 1,
        )
        .await
        .unwrap();

    let (target_url, click) = match resolution {
        Resolution::Redirecting { target_url, click } => (target_url, click),
        other => panic!("expected redirect, got {other:?}"),
    };
    assert_eq!(target_url, "https://example.com");
    assert_eq!(click.timestamp, NOW + 1);
    assert_eq!(click.referrer, "https://news.example");
    assert_eq!(click.user_agent, "Mozilla/5.0");
    assert_eq!(click.country, "Germany");

    let stored = store.find_by_shortcode("abc123").unwrap().unwrap();
    assert_eq!(stored.clicks, vec![click]);
}

#[tokio::test]
async fn test_missing_referrer_is_direct() {
    let (resolver, store, _temp_db) = setup(Arc::new(DisabledGeoLocator), Duration::from_secs(1));
    seed(&store, "abc123", "https://example.com", 10);

    let resolution = resolver
        .resolve("abc123", visit(None, None), NOW)
        .await
        .unwrap();

    let click = match resolution {
        Resolution::Redirecting { click, .. } => click,
        other => panic!("expected redirect, got {other:?}"),
    };
    assert_eq!(click.referrer, "direct");
    assert_eq!(click.user_agent, "");
    assert_eq!(click.country, "unknown");
}

#[tokio::test]
async fn test_unknown_shortcode_is_not_found_and_store_untouched() {
    let (resolver, store, _temp_db) = setup(Arc::new(DisabledGeoLocator), Duration::from_secs(1));
    seed(&store, "abc123", "https://example.com", 10);
    let before = store.load_all().unwrap();

    let resolution = resolver
        .resolve("nope42", visit(None, None), NOW)
        .await
        .unwrap();

    assert_eq!(resolution, Resolution::NotFound);
    assert_eq!(store.load_all().unwrap(), before);
}

#[tokio::test]
async fn test_expiry_boundary() {
    let (resolver, store, _temp_db) = setup(Arc::new(DisabledGeoLocator), Duration::from_secs(1));
    let mapping = seed(&store, "abc123", "https://example.com", 1);

    let just_before = resolver
        .resolve("abc123", visit(None, None), mapping.expires_at - 1)
        .await
        .unwrap();
    assert!(matches!(just_before, Resolution::Redirecting { .. }));

    for now in [mapping.expires_at, mapping.expires_at + 1, mapping.expires_at + 60 * MINUTE_MS] {
        let resolution = resolver
            .resolve("abc123", visit(None, None), now)
            .await
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::Expired {
                expires_at: mapping.expires_at
            }
        );
    }

    // Expired visits are not counted and the record stays in place
    let stored = store.find_by_shortcode("abc123").unwrap().unwrap();
    assert_eq!(stored.clicks.len(), 1);
}

#[tokio::test]
async fn test_each_resolution_appends_exactly_one_click() {
    let (resolver, store, _temp_db) = setup(Arc::new(DisabledGeoLocator), Duration::from_secs(1));
    seed(&store, "abc123", "https://example.com", 10);

    for i in 0..5 {
        resolver
            .resolve("abc123", visit(None, None), NOW + i)
            .await
            .unwrap();
    }

    let stored = store.find_by_shortcode("abc123").unwrap().unwrap();
    let timestamps: Vec<i64> = stored.clicks.iter().map(|c| c.timestamp).collect();
    assert_eq!(timestamps, [NOW, NOW + 1, NOW + 2, NOW + 3, NOW + 4]);
}

#[tokio::test]
async fn test_stalled_geolocation_times_out_to_unknown() {
    let (resolver, store, _temp_db) = setup(Arc::new(StalledGeo), Duration::from_millis(50));
    seed(&store, "abc123", "https://example.com", 10);

    let started = Instant::now();
    let resolution = resolver
        .resolve("abc123", visit(None, None), NOW)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    let click = match resolution {
        Resolution::Redirecting { click, .. } => click,
        other => panic!("expected redirect, got {other:?}"),
    };
    assert_eq!(click.country, "unknown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_visits_lose_no_clicks() {
    let (resolver, store, _temp_db) = setup(Arc::new(DisabledGeoLocator), Duration::from_secs(1));
    seed(&store, "hot", "https://example.com/hot", 10);
    seed(&store, "cold", "https://example.com/cold", 10);

    let mut handles = Vec::new();
    for i in 0..40 {
        let resolver = resolver.clone();
        let code = if i % 2 == 0 { "hot" } else { "cold" };
        handles.push(tokio::spawn(async move {
            resolver.resolve(code, Visit::default(), NOW + i).await
        }));
    }
    for handle in handles {
        let resolution = handle.await.unwrap().unwrap();
        assert!(matches!(resolution, Resolution::Redirecting { .. }));
    }

    assert_eq!(store.find_by_shortcode("hot").unwrap().unwrap().clicks.len(), 20);
    assert_eq!(store.find_by_shortcode("cold").unwrap().unwrap().clicks.len(), 20);
}

#[tokio::test]
async fn test_one_minute_link_lifecycle() {
    let (resolver, store, _temp_db) = setup(Arc::new(DisabledGeoLocator), Duration::from_secs(1));
    let flow = CreationFlow::new(store.clone(), Arc::new(TracingSink), Arc::new(RandomGenerator));

    let created = flow
        .create(
            &[CreateRow {
                url: "https://example.com".into(),
                validity_minutes: Some(Minutes::from(1)),
                custom_shortcode: Some(String::new()),
            }],
            NOW,
        )
        .await
        .unwrap();
    let code = created[0].shortcode.clone();

    let first = resolver.resolve(&code, visit(None, None), NOW).await.unwrap();
    assert!(
        matches!(first, Resolution::Redirecting { ref target_url, .. } if target_url == "https://example.com/")
    );
    assert_eq!(store.find_by_shortcode(&code).unwrap().unwrap().clicks.len(), 1);

    let later = resolver
        .resolve(&code, visit(None, None), NOW + MINUTE_MS + 1)
        .await
        .unwrap();
    assert!(matches!(later, Resolution::Expired { .. }));
    assert_eq!(store.find_by_shortcode(&code).unwrap().unwrap().clicks.len(), 1);
}
