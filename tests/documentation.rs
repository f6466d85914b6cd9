//! Integration setup: document routes, registration and configuration.

use axum::body::{to_bytes, Body};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, StatusCode};
use axum::routing::get as axum_get;
use axum_apispec::{
    api_handler, api_router, json_schema, setup_apispec, ApiRouter, ApiSchema, ApiSpec,
    ApiSpecConfig, ConfigError, HandlerMetadata, RequestContext, Validated,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceExt;

#[derive(Debug, Deserialize, ApiSchema)]
#[schema(name = "Pet")]
struct PetSchema {
    /// Pet name
    name: String,
    #[schema(one_of("cat", "dog"))]
    kind: Option<String>,
    #[serde(default)]
    age: u32,
}

/// Add a pet
#[api_handler]
#[docs(tags = ["pets"], operation_id = "addPet")]
#[request_schema(PetSchema)]
async fn add_pet(Validated(pet): Validated<PetSchema>) -> String {
    format!("{} {}", pet.name, pet.age)
}

#[api_handler]
#[use_kwargs(PetSchema, location = "form")]
async fn add_pet_form(ctx: RequestContext) -> axum::Json<Value> {
    axum::Json(ctx.data().clone())
}

async fn ping() -> &'static str {
    "pong"
}

#[derive(Debug, Deserialize, ApiSchema)]
struct Needed {
    id: i64,
}

mod users {
    use super::Needed;
    use axum_apispec::api_handler;

    #[api_handler]
    #[querystring_schema(Needed)]
    pub async fn list() -> &'static str {
        "users"
    }
}

mod posts {
    pub async fn list() -> &'static str {
        "posts"
    }
}

async fn get(router: axum::Router, uri: &str) -> axum::response::Response {
    router
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[test]
fn test_no_route_for_none_url() {
    let router = setup_apispec(ApiRouter::new(), ApiSpecConfig::default().url(None)).unwrap();
    assert_eq!(router.records().count(), 0);
}

#[test]
fn test_route_for_relative_url() {
    let router = setup_apispec(ApiRouter::new(), ApiSpecConfig::default().url(Some("api/swagger"))).unwrap();
    let paths: Vec<_> = router.records().filter_map(|r| r.path.clone()).collect();
    assert_eq!(paths, vec!["/api/swagger"]);
}

#[test]
fn test_register_twice_is_noop() {
    let mut router = ApiRouter::new();
    let mut apispec = ApiSpec::new(ApiSpecConfig::default());
    apispec.register(&mut router).unwrap();
    apispec.register(&mut router).unwrap();
    assert_eq!(router.records().count(), 1);

    // A second integration on the same router is ignored as well.
    let mut other = ApiSpec::new(ApiSpecConfig::default().yaml_url("/swagger.yaml"));
    other.register(&mut router).unwrap();
    assert_eq!(router.records().count(), 1);
}

#[tokio::test]
async fn test_register_twice_keeps_one_operation_per_route() {
    let mut router = ApiRouter::new().post("/pets", add_pet).get("/ping", ping);
    let mut apispec = ApiSpec::new(ApiSpecConfig::default());
    apispec.register(&mut router).unwrap();
    apispec.register(&mut router).unwrap();
    let router = router.into_router().unwrap();

    let response = get(router, "/api/docs/swagger.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let document: Value = serde_json::from_slice(&bytes).unwrap();

    let paths = document["paths"].as_object().unwrap();
    assert_eq!(paths.keys().collect::<Vec<_>>(), vec!["/pets"]);
    let methods: Vec<_> = paths["/pets"].as_object().unwrap().keys().collect();
    assert_eq!(methods, vec!["post"]);
}

#[tokio::test]
async fn test_same_handler_name_in_other_module() {
    let mut router = ApiRouter::new()
        .get("/users", users::list)
        .get("/posts", posts::list);
    let mut apispec = ApiSpec::new(ApiSpecConfig::default());
    apispec.register(&mut router).unwrap();
    let router = router.into_router().unwrap();

    let response = get(router.clone(), "/posts").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(router.clone(), "/users").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = get(router, "/users?id=1").await;
    assert_eq!(response.status(), StatusCode::OK);

    let document = apispec.swagger_dict().unwrap();
    assert!(document["paths"].get("/users").is_some());
    assert!(document["paths"].get("/posts").is_none());
}

#[tokio::test]
async fn test_nest_keeps_merged_axum_routes() {
    let plain = ApiRouter::new().merge_router(axum::Router::new().route("/ping", axum_get(ping)));
    let router = ApiRouter::new()
        .nest("/api", plain)
        .nest("/", ApiRouter::new().merge_router(axum::Router::new().route("/health", axum_get(ping))))
        .into_router()
        .unwrap();

    let response = get(router.clone(), "/api/ping").await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = get(router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_merged_apispec_routes_are_dropped() {
    let mut documented = ApiRouter::new().post("/pets", add_pet);
    ApiSpec::new(ApiSpecConfig::default().url(Some("/other.json")))
        .register(&mut documented)
        .unwrap();

    let router = setup_apispec(ApiRouter::new(), ApiSpecConfig::default())
        .unwrap()
        .merge(documented);
    let paths: Vec<_> = router.records().filter_map(|r| r.path.clone()).collect();
    assert_eq!(paths, vec!["/api/docs/swagger.json", "/pets"]);

    let router = router.into_router().unwrap();
    let response = get(router.clone(), "/other.json").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(router, "/api/docs/swagger.json").await;
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let document: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(document["paths"]["/pets"]["post"].is_object());
}

#[tokio::test]
async fn test_viewer_assets() {
    let router = setup_apispec(ApiRouter::new(), ApiSpecConfig::default().swagger_path("/docs"))
        .unwrap()
        .into_router()
        .unwrap();
    let response = get(router, "/docs").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"));

    let static_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/static");
    let config = ApiSpecConfig::default().swagger_path("/docs").static_dir(static_dir);
    let router = setup_apispec(ApiRouter::new(), config)
        .unwrap()
        .into_router()
        .unwrap();
    let response = get(router.clone(), "/docs").await;
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("/static/swagger/swagger-ui-bundle.js"));
    assert!(!page.contains("unpkg.com"));

    let response = get(router, "/static/swagger/index.html").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn test_multiple_json_bindings_rejected() {
    let err = HandlerMetadata::new()
        .request_schema(json_schema::<PetSchema>())
        .unwrap()
        .request_schema(json_schema::<PetSchema>())
        .unwrap_err();
    assert!(matches!(err, ConfigError::MultipleBodySchemas));
}

#[test]
fn test_derived_schema() {
    let schema = PetSchema::schema();
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["properties"]["name"]["description"], "Pet name");
    assert_eq!(schema["properties"]["kind"]["enum"], json!(["cat", "dog"]));
    assert_eq!(schema["required"], json!(["name"]));
    assert_eq!(PetSchema::schema_name().as_deref(), Some("Pet"));
}

#[tokio::test]
async fn test_serves_json_and_yaml() {
    let config = ApiSpecConfig::new("Pets", "2.1.0")
        .description("Pet store")
        .server("https://pets.example.com")
        .yaml_url("/api/docs/swagger.yaml");
    let router = setup_apispec(ApiRouter::new().post("/pets", add_pet), config)
        .unwrap()
        .into_router()
        .unwrap();

    let response = get(router.clone(), "/api/docs/swagger.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let document: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(document["openapi"], "3.0.3");
    assert_eq!(document["info"]["title"], "Pets");
    assert_eq!(document["info"]["description"], "Pet store");
    assert_eq!(document["servers"][0]["url"], "https://pets.example.com");

    let operation = &document["paths"]["/pets"]["post"];
    assert_eq!(operation["operationId"], "addPet");
    assert_eq!(operation["summary"], "Add a pet");
    assert_eq!(
        operation["requestBody"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/Pet"
    );

    let response = get(router, "/api/docs/swagger.yaml").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let yaml = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(yaml.contains("title: Pets"));
}

#[tokio::test]
async fn test_validated_extractor() {
    let router = api_router!("Pets", "1.0.0")
        .unwrap()
        .post("/pets", add_pet)
        .into_router()
        .unwrap();

    let request = Request::post("/pets")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "name": "Rex", "kind": "dog" }).to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"Rex 0");

    let request = Request::post("/pets")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "kind": "bird" }).to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["json"]["name"], json!(["Missing data for required field."]));
    assert!(body["json"]["kind"].is_array());
}

#[tokio::test]
async fn test_form_binding() {
    let router = api_router!("Pets", "1.0.0")
        .unwrap()
        .post("/pets/form", add_pet_form)
        .into_router()
        .unwrap();

    let request = Request::post("/pets/form")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("name=Tom&kind=cat&age=3"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "name": "Tom", "kind": "cat", "age": 3 }));
}

#[tokio::test]
async fn test_undocumented_router_skips_validation() {
    let router = ApiRouter::new()
        .post("/pets", add_pet)
        .get("/ping", ping)
        .into_router()
        .unwrap();

    let response = get(router.clone(), "/ping").await;
    assert_eq!(response.status(), StatusCode::OK);

    // Without an apispec there is no document route.
    let response = get(router, "/api/docs/swagger.json").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_in_place_build() {
    let mut router = ApiRouter::new().post("/pets", add_pet);
    let mut apispec = ApiSpec::new(ApiSpecConfig::default().in_place(true));
    apispec.register(&mut router).unwrap();

    assert!(apispec.spec().is_built());
    let document = apispec.swagger_dict().unwrap();
    assert!(document["paths"]["/pets"]["post"].is_object());
}
