//! Response shape adapters for `embedContent` replies.
//!
//! The remote API has answered with several payload layouts over time. Each
//! adapter recognises exactly one of them; [`extract_vector`] tries them in
//! [`RESPONSE_SHAPES`] order and reports what it saw when none match.

use serde_json::Value;

use precedent_core::{Error, Result};

pub struct ResponseShape {
    pub name: &'static str,
    pub extract: fn(&Value) -> Option<Vec<f32>>,
}

pub const RESPONSE_SHAPES: &[ResponseShape] = &[
    ResponseShape { name: "embeddings[0].values", extract: first_embedding_values },
    ResponseShape { name: "embedding.values", extract: embedding_values },
    ResponseShape { name: "embedding", extract: bare_embedding },
    ResponseShape { name: "values", extract: bare_values },
];

/// `{"embeddings": [{"values": [...]}, ...]}` (batch reply, first entry wins)
pub fn first_embedding_values(body: &Value) -> Option<Vec<f32>> {
    float_array(body.get("embeddings")?.as_array()?.first()?.get("values")?)
}

/// `{"embedding": {"values": [...]}}`
pub fn embedding_values(body: &Value) -> Option<Vec<f32>> {
    float_array(body.get("embedding")?.get("values")?)
}

/// `{"embedding": [...]}`
pub fn bare_embedding(body: &Value) -> Option<Vec<f32>> {
    float_array(body.get("embedding")?)
}

/// `{"values": [...]}`
pub fn bare_values(body: &Value) -> Option<Vec<f32>> {
    float_array(body.get("values")?)
}

pub fn extract_vector(body: &Value) -> Result<Vec<f32>> {
    RESPONSE_SHAPES
        .iter()
        .find_map(|shape| (shape.extract)(body))
        .ok_or_else(|| Error::Embedding(format!("no embedding in response ({})", describe(body))))
}

// Non-empty array of numbers only.
fn float_array(value: &Value) -> Option<Vec<f32>> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    items.iter().map(|x| x.as_f64().map(|f| f as f32)).collect()
}

fn describe(body: &Value) -> String {
    match body {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
        Value::Array(items) => format!("array of {}", items.len()),
        Value::String(_) => "string".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Null => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_shape() {
        let body = json!({"embeddings": [{"values": [0.1, 0.2]}, {"values": [9.0]}]});
        assert_eq!(first_embedding_values(&body), Some(vec![0.1, 0.2]));
        assert_eq!(first_embedding_values(&json!({"embeddings": []})), None);
    }

    #[test]
    fn single_shape() {
        let body = json!({"embedding": {"values": [1, 2, 3]}});
        assert_eq!(embedding_values(&body), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(bare_embedding(&body), None);
    }

    #[test]
    fn bare_shapes() {
        assert_eq!(bare_embedding(&json!({"embedding": [0.5]})), Some(vec![0.5]));
        assert_eq!(bare_values(&json!({"values": [0.25, 0.75]})), Some(vec![0.25, 0.75]));
        assert_eq!(bare_values(&json!({"values": [0.25, "x"]})), None);
    }

    #[test]
    fn order_prefers_batch_shape() {
        let body = json!({"embeddings": [{"values": [1.0]}], "values": [2.0]});
        assert_eq!(extract_vector(&body).expect("vector"), vec![1.0]);
    }

    #[test]
    fn failure_names_the_keys_seen() {
        let err = extract_vector(&json!({"error": {}, "usage": 3})).expect_err("no vector");
        let msg = err.to_string();
        assert!(matches!(err, Error::Embedding(_)));
        assert!(msg.contains("error") && msg.contains("usage"), "{msg}");
        let err = extract_vector(&json!([1, 2])).expect_err("no vector");
        assert!(err.to_string().contains("array of 2"));
    }
}
