//! Shared params extraction for registry methods

use serde_json::{Map, Value};

use crate::errors::AppError;

pub fn params_object<'a>(
    params: Option<&'a Value>,
    message: &str,
) -> Result<&'a Map<String, Value>, AppError> {
    params
        .and_then(Value::as_object)
        .ok_or_else(|| AppError::bad_request(message))
}

pub fn required_string(
    object: &Map<String, Value>,
    key: &str,
    message: &str,
) -> Result<String, AppError> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::bad_request(message))
}

/// Pagination cursor from `params.cursor`, when it is a string.
pub fn cursor(params: Option<&Value>) -> Option<String> {
    params
        .and_then(|params| params.get("cursor"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cursor_only_taken_from_strings() {
        assert_eq!(cursor(Some(&json!({"cursor": "next"}))).as_deref(), Some("next"));
        assert_eq!(cursor(Some(&json!({"cursor": 3}))), None);
        assert_eq!(cursor(None), None);
    }

    #[test]
    fn params_must_be_object() {
        let error = params_object(Some(&json!([1, 2])), "params must be an object")
            .expect_err("array is not an object");
        assert!(error.to_string().contains("bad request"));
    }

    #[test]
    fn required_string_rejects_other_types() {
        let params = json!({"name": 1});
        let object = params.as_object().expect("object");
        let error = required_string(object, "name", "name required").expect_err("not a string");
        assert_eq!(error.message(), "name required");
    }
}
