//! HTTP API tests
//!
//! Drive the full router with `oneshot` against an in-memory catalog and an
//! in-memory compare record.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use keybed_common::catalog::{
    Brand, Faq, ProductDetails, SpecBag, SpecValue, SpecificationCategory, SpecificationDocument,
};
use keybed_common::config::RoutePolicy;
use keybed_common::db::init_memory_database;
use keybed_common::events::{EventBus, KeybedEvent};
use keybed_sf::catalog::{InstrumentInput, SqliteCatalog};
use keybed_sf::compare::{CompareState, MemoryStorage};
use keybed_sf::{build_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "s3cret";

struct TestApp {
    router: Router,
    state: AppState,
}

fn instrument(id: &str, brand: Brand, price: f64, year: i32) -> InstrumentInput {
    InstrumentInput {
        id: Some(id.to_string()),
        name: id.replace('-', " "),
        brand,
        image: None,
        price,
        rating: Some(4.5),
        release_year: year,
        description: String::new(),
        specs: SpecBag::new(),
        popularity_score: None,
    }
}

async fn setup_with(policy: RoutePolicy, prune_dangling: bool, admin_token: Option<&str>) -> TestApp {
    let pool = init_memory_database().await.unwrap();
    let catalog = SqliteCatalog::new(pool);

    let mut minilogue = instrument("korg-minilogue-xd", Brand::Korg, 54_999.0, 2020);
    minilogue.specs.insert("keys".to_string(), SpecValue::from(37));
    minilogue.specs.insert("sequencer".to_string(), SpecValue::from(true));
    catalog.insert(&minilogue).await.unwrap();
    catalog
        .insert(&instrument("roland-fantom-8", Brand::Roland, 349_999.0, 2019))
        .await
        .unwrap();
    catalog
        .insert(&instrument("yamaha-montage-8", Brand::Yamaha, 399_999.0, 2016))
        .await
        .unwrap();
    catalog
        .insert(&instrument("casio-cdp-s360", Brand::Casio, 45_999.0, 2021))
        .await
        .unwrap();
    catalog
        .insert(&instrument("korg-kronos-2", Brand::Korg, 279_999.0, 2017))
        .await
        .unwrap();

    catalog
        .upsert_details(
            "korg-minilogue-xd",
            &ProductDetails {
                specifications: Some(SpecificationDocument::new(vec![
                    SpecificationCategory::new("Sound Engine").with_field("Polyphony", 4),
                    SpecificationCategory::new("Sequencer").with_field("Motion Sequencing", false),
                ])),
                faq: vec![Faq {
                    question: "Is it analog?".to_string(),
                    answer: "Yes, with a digital multi-engine.".to_string(),
                }],
                buy_links: vec![],
            },
        )
        .await
        .unwrap();

    let events = EventBus::new(64);
    let compare = CompareState::new(
        Box::new(MemoryStorage::new()),
        policy,
        prune_dangling,
        events.clone(),
    );
    let state = AppState::new(catalog, compare, events, admin_token.map(str::to_string));

    TestApp {
        router: build_router(state.clone()),
        state,
    }
}

async fn setup() -> TestApp {
    setup_with(RoutePolicy::Replace, false, Some(ADMIN_TOKEN)).await
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn call(&self, method: &str, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn admin(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("x-admin-token", token);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }
}

#[tokio::test]
async fn test_health_and_build_info() {
    let app = setup().await;

    let (status, body) = app.call("GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "keybed-sf");
    assert_eq!(body["catalog"], true);
    assert_eq!(body["compare_items"], 0);
    assert_eq!(body["compare_capacity"], 4);

    let (status, body) = app.call("GET", "/api/buildinfo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "keybed-sf");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["git_hash"].is_string());
}

#[tokio::test]
async fn test_add_returns_route_and_notice() {
    let app = setup().await;

    let (status, body) = app.call("POST", "/api/compare/korg-minilogue-xd").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["route"], "/compare/korg-minilogue-xd");
    assert_eq!(body["history"], "replace");
    assert_eq!(body["in_compare"], true);
    assert_eq!(body["count"], 1);
    assert_eq!(body["remaining_slots"], 3);
    assert_eq!(body["notice"]["level"], "success");
    assert_eq!(body["notice"]["message"], "Added to comparison list");

    let record = app.state.catalog.get("korg-minilogue-xd").await.unwrap().unwrap();
    assert_eq!(record.compare_count, 1);
}

#[tokio::test]
async fn test_duplicate_add_is_info_conflict() {
    let app = setup().await;
    app.call("POST", "/api/compare/korg-kronos-2").await;

    let (status, body) = app.call("POST", "/api/compare/korg-kronos-2").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["notice"]["level"], "info");
    assert_eq!(
        body["error"],
        "This instrument is already in your compare list"
    );
    assert_eq!(body["route"], "/compare/korg-kronos-2");

    let (_, set) = app.call("GET", "/api/compare").await;
    assert_eq!(set["count"], 1);
}

#[tokio::test]
async fn test_fifth_add_is_rejected() {
    let app = setup().await;
    for id in [
        "korg-minilogue-xd",
        "roland-fantom-8",
        "yamaha-montage-8",
        "casio-cdp-s360",
    ] {
        let (status, _) = app.call("POST", &format!("/api/compare/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app.call("POST", "/api/compare/korg-kronos-2").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["notice"]["level"], "error");
    assert_eq!(
        body["notice"]["message"],
        "You can compare up to 4 instruments at a time. Please remove one to add another."
    );
    assert_eq!(
        body["route"],
        "/compare/korg-minilogue-xd+roland-fantom-8+yamaha-montage-8+casio-cdp-s360"
    );

    let record = app.state.catalog.get("korg-kronos-2").await.unwrap().unwrap();
    assert_eq!(record.compare_count, 0);
}

#[tokio::test]
async fn test_add_unknown_or_invalid_id() {
    let app = setup().await;

    let (status, _) = app.call("POST", "/api/compare/moog-one").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call("POST", "/api/compare/a+b").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid instrument id"));

    let (_, set) = app.call("GET", "/api/compare").await;
    assert_eq!(set["count"], 0);
}

#[tokio::test]
async fn test_toggle_remove_and_clear() {
    let app = setup().await;

    let (_, body) = app.call("POST", "/api/compare/roland-fantom-8/toggle").await;
    assert_eq!(body["in_compare"], true);
    app.call("POST", "/api/compare/korg-kronos-2").await;

    let (_, body) = app.call("POST", "/api/compare/roland-fantom-8/toggle").await;
    assert_eq!(body["in_compare"], false);
    assert_eq!(body["notice"]["message"], "Removed from comparison list");
    assert_eq!(body["route"], "/compare/korg-kronos-2");

    // Removing something not compared is a silent no-op
    let (status, body) = app.call("DELETE", "/api/compare/yamaha-montage-8").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("notice").is_none());
    assert_eq!(body["count"], 1);

    let (_, body) = app.call("DELETE", "/api/compare").await;
    assert_eq!(body["count"], 0);
    assert_eq!(body["route"], "/compare");
    assert_eq!(body["notice"]["message"], "Comparison list cleared");
}

#[tokio::test]
async fn test_mutations_reach_event_bus() {
    let app = setup().await;
    let mut rx = app.state.events.subscribe();

    app.call("POST", "/api/compare/korg-kronos-2").await;

    match rx.recv().await.unwrap() {
        KeybedEvent::CompareSetChanged { item_ids, route, .. } => {
            assert_eq!(item_ids, vec!["korg-kronos-2"]);
            assert_eq!(route, "/compare/korg-kronos-2");
        }
        other => panic!("Unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_compare_view_builds_table() {
    let app = setup().await;

    let (status, body) = app
        .call("GET", "/compare/korg-minilogue-xd+roland-fantom-8")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["route"], "/compare/korg-minilogue-xd+roland-fantom-8");
    assert_eq!(body["arrival"]["changed"], true);

    let table = &body["table"];
    assert_eq!(table["columns"][0]["item_id"], "korg-minilogue-xd");
    assert_eq!(table["columns"][1]["item_id"], "roland-fantom-8");
    assert_eq!(table["basic_rows"][0]["label"], "Price");
    assert_eq!(
        table["basic_rows"][0]["cells"],
        json!(["₹54,999", "₹3,49,999"])
    );

    assert_eq!(table["categories"][0]["name"], "Sound Engine");
    assert_eq!(table["categories"][0]["rows"][0]["cells"], json!(["4", "—"]));
    assert_eq!(table["categories"][1]["rows"][0]["cells"], json!(["No", "—"]));

    // The arrival changed the stored set
    let (_, set) = app.call("GET", "/api/compare").await;
    assert_eq!(set["count"], 2);
}

#[tokio::test]
async fn test_compare_view_empty_state() {
    let app = setup().await;

    let (status, body) = app.call("GET", "/compare").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["table"].is_null());
    assert_eq!(body["route"], "/compare");
    assert!(body.get("arrival").is_none());
}

#[tokio::test]
async fn test_base_route_keeps_current_set() {
    let app = setup().await;
    app.call("POST", "/api/compare/korg-kronos-2").await;

    let (_, body) = app.call("GET", "/compare").await;
    assert_eq!(body["route"], "/compare/korg-kronos-2");
    assert_eq!(body["table"]["columns"][0]["item_id"], "korg-kronos-2");
}

#[tokio::test]
async fn test_arrival_reports_skipped_and_dangling() {
    let app = setup().await;

    let (_, body) = app
        .call("GET", "/compare/korg-kronos-2+ghost-synth+korg-kronos-2")
        .await;
    assert_eq!(body["arrival"]["skipped"][0]["item_id"], "korg-kronos-2");
    assert_eq!(body["dangling"], json!(["ghost-synth"]));
    assert_eq!(body["pruned"], false);
    assert_eq!(body["route"], "/compare/korg-kronos-2+ghost-synth");
    assert_eq!(body["table"]["columns"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_prune_dangling_removes_ids() {
    let app = setup_with(RoutePolicy::Replace, true, None).await;

    let (_, body) = app.call("GET", "/compare/ghost-synth+korg-kronos-2").await;
    assert_eq!(body["dangling"], json!(["ghost-synth"]));
    assert_eq!(body["pruned"], true);
    assert_eq!(body["route"], "/compare/korg-kronos-2");

    let (_, set) = app.call("GET", "/api/compare").await;
    assert_eq!(set["count"], 1);
}

#[tokio::test]
async fn test_unreadable_record_is_never_pruned() {
    let app = setup_with(RoutePolicy::Replace, true, None).await;
    app.call("POST", "/api/compare/korg-kronos-2").await;
    app.call("POST", "/api/compare/roland-fantom-8").await;

    sqlx::query("UPDATE instruments SET brand = 'Moog' WHERE id = 'korg-kronos-2'")
        .execute(app.state.catalog.pool())
        .await
        .unwrap();

    let (status, body) = app.call("GET", "/compare").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unavailable"], json!(["korg-kronos-2"]));
    assert_eq!(body["dangling"], json!([]));
    assert_eq!(body["pruned"], false);
    assert_eq!(body["table"]["columns"].as_array().unwrap().len(), 1);
    assert_eq!(body["route"], "/compare/korg-kronos-2+roland-fantom-8");

    let (_, set) = app.call("GET", "/api/compare").await;
    assert_eq!(set["count"], 2);
}

#[tokio::test]
async fn test_link_with_only_invalid_ids_keeps_set() {
    let app = setup().await;
    app.call("POST", "/api/compare/korg-kronos-2").await;
    app.call("POST", "/api/compare/roland-fantom-8").await;

    let (status, body) = app.call("GET", "/compare/bad!id").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["arrival"]["changed"], false);
    assert_eq!(body["arrival"]["skipped"][0]["item_id"], "bad!id");
    assert_eq!(body["route"], "/compare/korg-kronos-2+roland-fantom-8");

    let (_, set) = app.call("GET", "/api/compare").await;
    assert_eq!(set["count"], 2);
}

#[tokio::test]
async fn test_merge_policy_keeps_existing_items() {
    let app = setup_with(RoutePolicy::Merge, false, None).await;
    app.call("POST", "/api/compare/casio-cdp-s360").await;

    let (_, body) = app.call("GET", "/compare/korg-kronos-2").await;
    assert_eq!(body["route"], "/compare/casio-cdp-s360+korg-kronos-2");
}

#[tokio::test]
async fn test_listing_filters_sort_and_pagination() {
    let app = setup().await;

    let (status, body) = app.call("GET", "/api/instruments").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_results"], 5);
    assert_eq!(body["page_size"], 24);
    assert_eq!(body["total_pages"], 1);
    assert_eq!(body["has_next"], false);

    let (_, body) = app
        .call("GET", "/api/instruments?sort=price-low-high&brands=Korg")
        .await;
    let ids: Vec<&str> = body["instruments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["korg-minilogue-xd", "korg-kronos-2"]);

    let (_, body) = app.call("GET", "/api/instruments?has_sequencer=true").await;
    assert_eq!(body["total_results"], 1);

    let (_, body) = app
        .call("GET", "/api/instruments?min_price=100000&years=2016,2019")
        .await;
    assert_eq!(body["total_results"], 2);

    let (status, _) = app.call("GET", "/api/instruments?sort=alphabetical").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_latest_and_brand_pages() {
    let app = setup().await;

    let (_, body) = app.call("GET", "/api/instruments/latest?limit=2").await;
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["casio-cdp-s360", "korg-minilogue-xd"]);

    let (status, body) = app.call("GET", "/api/brands/korg/instruments").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["brand"], "Korg");
    assert_eq!(body["instruments"].as_array().unwrap().len(), 2);

    let (status, _) = app.call("GET", "/api/brands/moog/instruments").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_detail() {
    let app = setup().await;
    app.call("POST", "/api/compare/korg-minilogue-xd").await;

    let (status, body) = app.call("GET", "/api/instruments/korg-minilogue-xd").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["instrument"]["brand"], "Korg");
    assert_eq!(body["instrument"]["image"], "/placeholder.svg");
    assert_eq!(body["details"]["faq"][0]["question"], "Is it analog?");
    assert_eq!(body["details"]["specifications"][0]["name"], "Sound Engine");
    assert_eq!(body["in_compare"], true);

    let (status, body) = app.call("GET", "/api/instruments/roland-fantom-8").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["details"]["specifications"].is_null());
    assert_eq!(body["in_compare"], false);

    let (status, _) = app.call("GET", "/api/instruments/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_requires_token() {
    let disabled = setup_with(RoutePolicy::Replace, false, None).await;
    let (status, _) = disabled
        .admin("DELETE", "/api/admin/instruments/korg-kronos-2", Some("anything"), Value::Null)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let app = setup().await;
    let (status, _) = app
        .admin("DELETE", "/api/admin/instruments/korg-kronos-2", None, Value::Null)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .admin("DELETE", "/api/admin/instruments/korg-kronos-2", Some("wrong"), Value::Null)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.state.catalog.get("korg-kronos-2").await.unwrap().is_some());
}

#[tokio::test]
async fn test_admin_crud() {
    let app = setup().await;
    let mut rx = app.state.events.subscribe();

    let (status, body) = app
        .admin(
            "POST",
            "/api/admin/instruments",
            Some(ADMIN_TOKEN),
            json!({
                "id": "korg-opsix",
                "name": "Korg opsix",
                "brand": "Korg",
                "price": 64999,
                "releaseYear": 2020,
                "specs": {"keys": 37, "sequencer": true}
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "korg-opsix");
    assert_eq!(body["rating"], 4.5);

    match rx.recv().await.unwrap() {
        KeybedEvent::InstrumentChanged { instrument_id, .. } => {
            assert_eq!(instrument_id, "korg-opsix")
        }
        other => panic!("Unexpected event: {:?}", other),
    }

    let (status, body) = app
        .admin(
            "PUT",
            "/api/admin/instruments/korg-opsix",
            Some(ADMIN_TOKEN),
            json!({
                "name": "Korg opsix SE",
                "brand": "Korg",
                "price": 89999,
                "release_year": 2022
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Korg opsix SE");

    let (status, _) = app
        .admin(
            "PUT",
            "/api/admin/instruments/korg-opsix/details",
            Some(ADMIN_TOKEN),
            json!({
                "specifications": [{"name": "General", "specs": {"Keys": 61}}],
                "faq": [],
                "buyLinks": [{"store": "Local shop", "url": "https://example.com/opsix"}]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let details = app.state.catalog.details("korg-opsix").await.unwrap().unwrap();
    assert_eq!(details.buy_links.len(), 1);

    let (status, _) = app
        .admin(
            "PUT",
            "/api/admin/instruments/ghost/details",
            Some(ADMIN_TOKEN),
            json!({"faq": []}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .admin(
            "POST",
            "/api/admin/instruments",
            Some(ADMIN_TOKEN),
            json!({"name": "", "brand": "Korg", "price": 1, "release_year": 2020}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .admin("DELETE", "/api/admin/instruments/korg-opsix", Some(ADMIN_TOKEN), Value::Null)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .admin("DELETE", "/api/admin/instruments/korg-opsix", Some(ADMIN_TOKEN), Value::Null)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleted_instrument_becomes_dangling() {
    let app = setup().await;
    app.call("POST", "/api/compare/korg-kronos-2").await;
    app.call("POST", "/api/compare/roland-fantom-8").await;

    app.admin("DELETE", "/api/admin/instruments/korg-kronos-2", Some(ADMIN_TOKEN), Value::Null)
        .await;

    let (_, body) = app.call("GET", "/compare").await;
    assert_eq!(body["dangling"], json!(["korg-kronos-2"]));
    assert_eq!(body["table"]["columns"].as_array().unwrap().len(), 1);
    assert_eq!(body["route"], "/compare/korg-kronos-2+roland-fantom-8");
}
