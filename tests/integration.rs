use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use parcel_engine::api::rest::router;
use parcel_engine::geocoder::provider::{GeocodeCandidate, GeocodingProvider};
use parcel_engine::geocoder::{GeocodeError, GeocoderSettings};
use parcel_engine::models::driver::GeoPoint;
use parcel_engine::state::AppState;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

/// Knows two Nairobi addresses; everything else is unknown.
struct StaticProvider;

const PLACES: [(&str, f64, f64, &str); 2] = [
    ("kenyatta avenue", -1.2864, 36.8172, "Kenyatta Avenue, Nairobi, Kenya"),
    ("westlands", -1.2676, 36.8108, "Westlands, Nairobi, Kenya"),
];

#[async_trait]
impl GeocodingProvider for StaticProvider {
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<GeocodeCandidate>, GeocodeError> {
        let query = query.to_lowercase();
        Ok(PLACES
            .iter()
            .filter(|(key, ..)| query.contains(key) || key.contains(query.as_str()))
            .take(limit)
            .map(|(_, lat, lng, name)| GeocodeCandidate {
                location: GeoPoint::new(*lat, *lng),
                display_name: name.to_string(),
                importance: Some(0.5),
            })
            .collect())
    }

    async fn reverse(&self, point: GeoPoint) -> Result<Option<String>, GeocodeError> {
        Ok(PLACES
            .iter()
            .find(|(_, lat, lng, _)| (lat - point.lat).abs() < 0.01 && (lng - point.lng).abs() < 0.01)
            .map(|(.., name)| name.to_string()))
    }
}

fn setup() -> axum::Router {
    let state = AppState::new(1024, Arc::new(StaticProvider), GeocoderSettings::default());
    router(Arc::new(state))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn parcel_body(customer: Uuid) -> Value {
    json!({
        "sender": { "name": "Achieng Otieno", "account_id": customer },
        "recipient": { "name": "Kamau Njoroge", "phone": "+254700000000" },
        "pickup_address": "Kenyatta Avenue",
        "delivery_address": "Westlands",
        "weight_kg": 1.2,
        "delivery_fee": 300.0
    })
}

async fn register_driver(app: &axum::Router, available: bool) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "name": "Otieno",
                "vehicle_type": "motorcycle",
                "location": { "lat": -1.2833, "lng": 36.8167 },
                "rating": 4.6,
                "available": available
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

async fn create_parcel(app: &axum::Router, customer: Uuid) -> Value {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/parcels", parcel_body(customer)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn transition(
    app: &axum::Router,
    parcel_id: &str,
    body: Value,
) -> axum::response::Response {
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/parcels/{parcel_id}/transitions"),
            body,
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["drivers"], 0);
    assert_eq!(body["parcels"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    create_parcel(&app, Uuid::new_v4()).await;

    let response = app.oneshot(get_request("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("parcels_created_total 1"));
    assert!(body.contains("geocode_requests_total"));
}

#[tokio::test]
async fn create_parcel_resolves_addresses_and_is_trackable() {
    let app = setup();
    let parcel = create_parcel(&app, Uuid::new_v4()).await;

    assert_eq!(parcel["status"], "pending");
    assert_eq!(parcel["version"], 1);
    assert_eq!(parcel["history"].as_array().unwrap().len(), 1);
    assert_eq!(
        parcel["pickup"]["canonical"],
        "Kenyatta Avenue, Nairobi, Kenya"
    );

    let tracking_number = parcel["tracking_number"].as_str().unwrap();
    assert!(tracking_number.starts_with("PKG-"));

    let response = app
        .clone()
        .oneshot(get_request(&format!("/tracking/{tracking_number}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], parcel["id"]);
}

#[tokio::test]
async fn create_parcel_rejects_short_address() {
    let app = setup();
    let mut body = parcel_body(Uuid::new_v4());
    body["pickup_address"] = json!("ab");

    let response = app
        .oneshot(json_request("POST", "/parcels", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["kind"], "invalid_address");
}

#[tokio::test]
async fn get_unknown_parcel_returns_404() {
    let app = setup();
    let response = app
        .oneshot(get_request(&format!("/parcels/{}", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["kind"], "not_found");
}

#[tokio::test]
async fn delivery_lifecycle_over_http() {
    let app = setup();
    let customer = Uuid::new_v4();
    let driver = register_driver(&app, true).await;
    let parcel = create_parcel(&app, customer).await;
    let parcel_id = parcel["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(get_request(&format!("/parcels/{parcel_id}/actions")))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await,
        json!(["assign", "reassign", "cancel"])
    );

    let response = transition(
        &app,
        parcel_id,
        json!({ "action": "assign", "actor_id": driver, "driver_id": driver }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["parcel"]["status"], "assigned");
    assert_eq!(body["parcel"]["assigned_driver"], driver.as_str());
    assert!(body["parcel"]["estimated_delivery_time"].is_string());

    for action in ["confirm_pickup", "depart", "arrive_at_recipient", "confirm_delivery"] {
        let response = transition(
            &app,
            parcel_id,
            json!({ "action": action, "actor_id": driver }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK, "{action}");
    }

    let response = transition(
        &app,
        parcel_id,
        json!({ "action": "mark_complete", "actor_id": driver }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = transition(
        &app,
        parcel_id,
        json!({ "action": "mark_complete", "actor_id": customer }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request(&format!("/parcels/{parcel_id}/history")))
        .await
        .unwrap();
    let history = body_json(response).await;
    let statuses: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["status"].as_str().unwrap())
        .collect();
    assert_eq!(
        statuses,
        [
            "pending",
            "assigned",
            "picked_up",
            "in_transit",
            "delivered_to_recipient",
            "delivered",
            "completed"
        ]
    );

    let response = transition(
        &app,
        parcel_id,
        json!({ "action": "cancel", "actor_id": customer }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["kind"], "invalid_state");
}

#[tokio::test]
async fn assigning_unavailable_driver_conflicts() {
    let app = setup();
    let driver = register_driver(&app, false).await;
    let parcel = create_parcel(&app, Uuid::new_v4()).await;

    let response = transition(
        &app,
        parcel["id"].as_str().unwrap(),
        json!({ "action": "assign", "actor_id": driver, "driver_id": driver }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["kind"], "driver_unavailable");
}

#[tokio::test]
async fn stale_version_conflicts() {
    let app = setup();
    let customer = Uuid::new_v4();
    let parcel = create_parcel(&app, customer).await;

    let response = transition(
        &app,
        parcel["id"].as_str().unwrap(),
        json!({ "action": "cancel", "actor_id": customer, "expected_version": 7 }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["kind"], "concurrent_modification");
}

#[tokio::test]
async fn unknown_action_is_rejected() {
    let app = setup();
    let customer = Uuid::new_v4();
    let parcel = create_parcel(&app, customer).await;

    let response = transition(
        &app,
        parcel["id"].as_str().unwrap(),
        json!({ "action": "teleport", "actor_id": customer }),
    )
    .await;

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn candidates_rank_available_drivers() {
    let app = setup();
    let available = register_driver(&app, true).await;
    register_driver(&app, false).await;
    let parcel = create_parcel(&app, Uuid::new_v4()).await;

    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/parcels/{}/candidates?vehicle_type=motorcycle",
            parcel["id"].as_str().unwrap()
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let ranked = body_json(response).await;
    let ranked = ranked.as_array().unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0]["driver"]["id"], available.as_str());
    assert!(ranked[0]["distance_km"].as_f64().unwrap() < 5.0);
}

#[tokio::test]
async fn driver_updates_and_filters() {
    let app = setup();
    let driver = register_driver(&app, true).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{driver}/availability"),
            json!({ "available": false }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["available"], false);

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{driver}/location"),
            json!({ "location": { "lat": 123.0, "lng": 36.8 } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(get_request("/drivers?available=true"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 0);

    let response = app
        .oneshot(get_request("/drivers?available=false"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn geocode_endpoints() {
    let app = setup();

    let response = app
        .clone()
        .oneshot(get_request("/geocode/resolve?address=Westlands"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["canonical_address"], "Westlands, Nairobi, Kenya");
    assert_eq!(body["approximate"], false);

    let response = app
        .clone()
        .oneshot(get_request("/geocode/resolve?address=Atlantis%20Road"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(get_request(
            "/geocode/resolve?address=Atlantis%20Road&fallback=true",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["approximate"], true);
    assert_eq!(body["location"]["lat"], -1.2921);

    let response = app
        .clone()
        .oneshot(get_request("/geocode/suggest?q=west&limit=3"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["candidates"].as_array().unwrap().len(), 1);
    assert!(body["error"].is_null());

    let response = app
        .clone()
        .oneshot(get_request("/geocode/reverse?lat=-1.2676&lng=36.8108"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["address"], "Westlands, Nairobi, Kenya");

    let response = app
        .oneshot(get_request("/geocode/reverse?lat=95&lng=36.8"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn estimate_uses_banded_speeds() {
    let app = setup();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/estimate",
            json!({
                "from": { "lat": -1.2921, "lng": 36.8219 },
                "to": { "lat": -4.0435, "lng": 39.6682 }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let distance = body["distance_km"].as_f64().unwrap();
    assert!((distance - 440.0).abs() < 5.0);
    let expected = (distance * 2.0).round() as u64 + 10;
    assert_eq!(body["eta_minutes"].as_u64().unwrap(), expected);

    let response = app
        .oneshot(json_request(
            "POST",
            "/estimate",
            json!({
                "from": { "lat": 91.0, "lng": 0.0 },
                "to": { "lat": 0.0, "lng": 0.0 }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["kind"], "invalid_coordinates");
}
