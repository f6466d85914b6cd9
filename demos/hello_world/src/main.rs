//! A toy users service with request validation and a Swagger UI at `/docs`.
//!
//! ```text
//! cargo run -p hello_world
//! cargo run -p hello_world -- --print-spec
//! ```

use axum::{Extension, Json};
use axum_apispec::{api_handler, setup_apispec, ApiRouter, ApiSchema, ApiSpecConfig, RequestContext};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

type Users = Arc<Mutex<Vec<User>>>;

#[derive(Debug, Clone, Deserialize, Serialize, ApiSchema)]
struct User {
    id: u32,
    name: String,
    #[schema(one_of("f", "m"))]
    gender: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ApiSchema)]
struct Message {
    message: Option<String>,
}

#[derive(Debug, Serialize, ApiSchema)]
struct UsersList {
    users: Vec<User>,
}

/// Get users list
///
/// Get list of all users from our toy database
#[api_handler]
#[docs(
    tags = ["users"],
    response(status = 404, description = "Not Found"),
    response(status = 500, description = "Server error")
)]
#[response_schema(UsersList, 200, description = "Ok. Users list")]
async fn get_users(Extension(users): Extension<Users>) -> Json<UsersList> {
    let users = users.lock().map(|users| users.clone()).unwrap_or_default();
    Json(UsersList { users })
}

/// Create new user
///
/// Add new user to our toy database
#[api_handler]
#[docs(
    tags = ["users"],
    response(status = 400, description = "Validation error"),
    response(status = 401, description = "Unauthorized"),
    response(status = 500, description = "Server error")
)]
#[headers_schema(Message)]
#[json_schema(UsersList)]
#[querystring_schema(User)]
#[response_schema(Message, 200, description = "Ok. User created")]
async fn create_user(Extension(users): Extension<Users>, ctx: RequestContext) -> Json<Value> {
    info!(headers = ?ctx.get("headers"), json = ?ctx.get("json"), "create user");

    let user: User = match ctx.parse("querystring") {
        Ok(user) => user,
        Err(err) => return Json(json!({ "message": err.to_string() })),
    };
    let message = format!("Hello {}!", user.name);
    if let Ok(mut users) = users.lock() {
        users.push(user);
    }
    Json(json!({ "message": message }))
}

fn app() -> Result<axum::Router, axum_apispec::ConfigError> {
    let routes = ApiRouter::new()
        .get("/users", get_users)
        .post("/users", create_user);

    let config = ApiSpecConfig::new("Users API", "1.0.0")
        .description("A toy users database")
        .swagger_path("/docs");

    let users: Users = Arc::default();
    Ok(setup_apispec(routes, config)?
        .into_router()?
        .layer(Extension(users)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if std::env::args().any(|arg| arg == "--print-spec") {
        let routes = ApiRouter::new()
            .get("/users", get_users)
            .post("/users", create_user);
        let spec = routes.openapi_spec()?;
        println!("{}", serde_json::to_string_pretty(&spec)?);
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
    info!("listening on http://127.0.0.1:8080, docs at /docs");
    axum::serve(listener, app()?).await?;
    Ok(())
}
