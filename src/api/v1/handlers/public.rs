/*
 * Responsibility
 * - GET /public/hello (認証不要)
 */
use axum::Json;
use serde_json::{Value, json};

pub async fn hello() -> Json<Value> {
    Json(json!({ "message": "Hello from a public endpoint!" }))
}
