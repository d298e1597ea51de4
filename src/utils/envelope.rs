use actix_web::HttpResponse;
use serde_json::{json, Value};

/// Wraps a payload into the `{ status: 1, ... }` envelope.
pub fn success(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) => {
            map.insert("status".to_string(), json!(1));
            Value::Object(map)
        }
        Value::Null => json!({ "status": 1 }),
        other => json!({ "status": 1, "data": other }),
    }
}

pub fn ok(payload: Value) -> HttpResponse {
    HttpResponse::Ok().json(success(payload))
}

pub fn ok_empty() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": 1 }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_payload_is_merged() {
        let body = success(json!({ "favorited": true }));
        assert_eq!(body, json!({ "status": 1, "favorited": true }));
    }

    #[test]
    fn test_non_object_payload_is_nested() {
        assert_eq!(success(json!([1, 2])), json!({ "status": 1, "data": [1, 2] }));
        assert_eq!(success(Value::Null), json!({ "status": 1 }));
    }
}
