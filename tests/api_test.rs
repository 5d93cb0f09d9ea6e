use aaps_api::config::{ApiUser, AuthConfig, Config};
use aaps_api::domain::Epsa;
use aaps_api::server::create_server;
use aaps_api::storage::sqlite::SqliteStorage;
use aaps_api::storage::Storage;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app_with_config(config: Config) -> Router {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.run_migrations().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(storage);
    create_server(storage, Arc::new(config))
}

fn app() -> Router {
    app_with_config(Config::default())
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_service_name() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "aaps-api");
}

#[tokio::test]
async fn epsa_bulk_upsert_lifecycle() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/epsas",
        Some(json!([
            { "code": "EPSAS", "name": "Empresa Pública Social", "state": "LP", "category": "A" },
            { "code": "SAGUAPAC", "state": "SC", "category": "A" },
            { "name": "sin sigla" }
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let outcomes = body.as_array().unwrap();
    assert!(outcomes[0].get("created").is_some());
    assert!(outcomes[1].get("created").is_some());
    assert_eq!(outcomes[2]["ignored"]["reason"], "missing_key");

    // re-posting the same keys updates in place
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/epsas",
        Some(json!([{ "code": "SAGUAPAC", "state": "SC", "category": "B" }])),
    )
    .await;
    assert!(body[0].get("updated").is_some());

    let (status, body) = send(&app, Method::GET, "/api/epsas?state=SC", None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["category"], "B");

    let (status, body) = send(&app, Method::GET, "/api/epsas/EPSAS", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Empresa Pública Social");

    let (status, _) = send(&app, Method::DELETE, "/api/epsas/EPSAS", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, "/api/epsas/EPSAS", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fields_param_projects_and_output_is_sparse() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/api/epsas",
        Some(json!([{ "code": "AAPOS", "state": "PO", "category": "A" }])),
    )
    .await;

    let (_, body) = send(&app, Method::GET, "/api/epsas?fields=code,category", None).await;
    let record = &body.as_array().unwrap()[0];
    assert_eq!(record["code"], "AAPOS");
    assert_eq!(record["category"], "A");
    assert!(record.get("state").is_none());

    // name was never set and is omitted entirely, not serialized as null
    let (_, body) = send(&app, Method::GET, "/api/epsas/AAPOS", None).await;
    assert!(body.get("name").is_none());
    assert!(body.get("modified").is_some());
}

#[tokio::test]
async fn single_object_post_validates_with_400() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/epsas",
        Some(json!({ "code": "BAD", "category": "Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("errors").is_some());

    // the record was not stored
    let (status, _) = send(&app, Method::GET, "/api/epsas/BAD", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_preserves_unmentioned_fields() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/api/epsas",
        Some(json!({ "code": "AAPOS", "name": "old name", "state": "PO" })),
    )
    .await;
    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/epsas/AAPOS",
        Some(json!({ "name": "new name" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "new name");
    assert_eq!(body["state"], "PO");
}

#[tokio::test]
async fn report_bulk_upsert_is_idempotent_on_same_tuple() {
    let app = app();
    let payload = json!([
        { "epsa": "AAPOS", "year": 2017, "month": null, "v1": "790840.00", "v2_type": "NR" },
        { "epsa": "AAPOS", "year": 2017, "month": 6, "v1": 100.0 }
    ]);
    let (status, body) = send(&app, Method::POST, "/api/reports", Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body[0].get("created").is_some());
    assert!(body[1].get("created").is_some());

    let (_, body) = send(&app, Method::POST, "/api/reports", Some(payload)).await;
    assert!(body[0].get("updated").is_some());
    assert!(body[1].get("updated").is_some());

    // two rows total, and the annual one holds the parsed string value
    let (_, body) = send(&app, Method::GET, "/api/reports?epsa=AAPOS&year=2017", None).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    let annual = rows.iter().find(|r| r.get("month").is_none()).unwrap();
    assert_eq!(annual["v1"], 790840.0);
    assert_eq!(annual["v2_type"], "NR");
}

#[tokio::test]
async fn measurement_detail_round_trip_by_id() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/measurements",
        Some(json!({ "epsa": "SAGUAPAC", "year": 2014, "month": null, "ind1": 98.7 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();

    let (status, body) =
        send(&app, Method::GET, &format!("/api/measurements/{id}?fields=epsa,ind1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "epsa": "SAGUAPAC", "ind1": 98.7 }));
}

#[tokio::test]
async fn poa_expense_sheets_are_exclusive() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/poas",
        Some(json!({
            "epsa": "SAGUAPAC", "year": 2019, "order": 1,
            "coop_expense": { "costos_operacion": 10.0 },
            "muni_expense": { "gastos_otros": 1.0 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"][0].as_str().unwrap().contains("expense sheet"));

    // the bulk path tags the same condition instead of failing the request
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/poas",
        Some(json!([
            {
                "epsa": "SAGUAPAC", "year": 2019, "order": 1,
                "coop_expense": { "costos_operacion": 10.0 }
            },
            {
                "epsa": "SAGUAPAC", "year": 2019, "order": 2,
                "coop_expense": { "costos_operacion": 1.0 },
                "muni_expense": { "gastos_otros": 1.0 }
            }
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body[0].get("created").is_some());
    assert!(body[1].get("rejected").is_some());

    // nested sheet came back on the read path
    let (_, body) = send(&app, Method::GET, "/api/poas?epsa=SAGUAPAC", None).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["coop_expense"]["costos_operacion"], 10.0);
}

#[tokio::test]
async fn single_poa_post_registers_epsa_code() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/api/poas",
        Some(json!({ "epsa": "NUEVA", "year": 2020, "order": 1 })),
    )
    .await;
    let (status, _) = send(&app, Method::GET, "/api/epsas/NUEVA", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn plan_upsert_replaces_goals() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/api/plans",
        Some(json!([{
            "epsa": "AAPOS", "year": 2018, "plan_type": "ptds",
            "goals": [
                { "year": 2019, "description": "cobertura AP", "value": 90.0, "unit": "%" },
                { "year": 2020, "description": "cobertura ALC", "value": 60.0, "unit": "%" }
            ]
        }])),
    )
    .await;
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/plans",
        Some(json!([{
            "epsa": "AAPOS", "year": 2018,
            "goals": [{ "year": 2021, "description": "micromedición", "value": 80.0, "unit": "%" }]
        }])),
    )
    .await;
    assert!(body[0].get("updated").is_some());

    let (_, body) = send(&app, Method::GET, "/api/plans?epsa=AAPOS", None).await;
    let goals = body[0]["goals"].as_array().unwrap();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0]["description"], "micromedición");
}

#[tokio::test]
async fn sarh_full_update_and_children() {
    let app = app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/sarhs",
        Some(json!([{
            "sarh_id": "00123-00456-1",
            "epsa": "SAGUAPAC",
            "sub_subt": "SUBTERRANEO",
            "geom": { "type": "Point", "coordinates": [-63.18, -17.78] },
            "tecnical_sub": [ { "year": 2016, "tiene_medidor": "SI", "aforo": 12.0 } ]
        }])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::GET, "/api/sarhs/00123-00456-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["geom"]["type"], "Point");
    assert_eq!(body["tecnical_sub"][0]["aforo"], 12.0);

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/sarhs/00123-00456-1",
        Some(json!({ "municipality": "SANTA CRUZ DE LA SIERRA" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["municipality"], "SANTA CRUZ DE LA SIERRA");
    assert_eq!(body["tecnical_sub"][0]["year"], 2016);

    let (_, body) = send(&app, Method::GET, "/api/sarhs?epsa=SAGUAPAC", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn supply_areas_speak_geojson() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/api/epsas",
        Some(json!([{ "code": "AAPOS", "state": "PO" }])),
    )
    .await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/supply_areas",
        Some(json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "epsa": "AAPOS", "area": 3243.01 },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[
                        [-65.737329, -19.606613],
                        [-65.7, -19.6],
                        [-65.72, -19.59],
                        [-65.737329, -19.606613]
                    ]]]
                }
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::GET, "/api/supply_areas?state=PO", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "FeatureCollection");
    assert_eq!(body["crs"]["properties"]["type"], "proj4");
    let feature = &body["features"][0];
    assert_eq!(feature["properties"]["epsa"], "AAPOS");
    assert_eq!(feature["geometry"]["type"], "MultiPolygon");
    assert!(feature.get("id").is_none());

    let (_, body) = send(&app, Method::GET, "/api/supply_areas?state=LP", None).await;
    assert_eq!(body["features"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn database_file_persists_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aaps.db");
    {
        let storage = SqliteStorage::open(&path).unwrap();
        storage.run_migrations().unwrap();
        let mut epsa: Epsa = serde_json::from_value(json!({ "code": "AAPOS" })).unwrap();
        storage.create_epsa(&mut epsa).await.unwrap();
    }
    let storage = SqliteStorage::open(&path).unwrap();
    storage.run_migrations().unwrap();
    assert!(storage.get_epsa("AAPOS").await.unwrap().is_some());
}

#[tokio::test]
async fn api_requires_credentials_when_configured() {
    let config = Config {
        auth: AuthConfig {
            users: vec![ApiUser {
                username: "admin-der".to_string(),
                password: "secret".to_string(),
                token: "tok-123".to_string(),
            }],
        },
        ..Default::default()
    };
    let app = app_with_config(config);

    let (status, _) = send(&app, Method::GET, "/api/epsas", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // health stays open
    let (status, _) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    // token exchange, then an authorized request
    let (status, body) = send(
        &app,
        Method::POST,
        "/api-token-auth",
        Some(json!({ "username": "admin-der", "password": "secret" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"], "tok-123");

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/epsas")
        .header(header::AUTHORIZATION, "Token tok-123")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api-token-auth",
        Some(json!({ "username": "admin-der", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
