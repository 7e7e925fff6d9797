use axum::Json;
use serde_json::{json, Value};

pub async fn root_handler() -> Json<Value> {
    Json(json!({ "message": "Hello! - API Gateway" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_root_handler() {
        let response = root_handler().await;
        assert_eq!(response.0["message"], "Hello! - API Gateway");
    }
}
