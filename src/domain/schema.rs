//! Validator contract for tool arguments and JSON-Schema derivation
//!
//! Any validator exposing an async `validate(input) -> value | issues` operation
//! can guard a tool. [`TypedSchema`] is the stock implementation: serde decodes
//! the arguments into a Rust type and schemars derives the advertised schema.

use std::marker::PhantomData;

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
}

impl ValidationIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
        }
    }

    pub fn at(mut self, path: Vec<String>) -> Self {
        self.path = Some(path);
        self
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema conversion is not supported: {0}")]
    Unsupported(String),
    #[error("schema serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait InputSchema: Send + Sync {
    /// Returns the parsed value, or the list of problems found in `input`.
    async fn validate(&self, input: Value) -> Result<Value, Vec<ValidationIssue>>;

    /// Best-effort JSON Schema for `tools/list`.
    async fn json_schema(&self) -> Result<Value, SchemaError>;
}

/// Validates by decoding into `T`; advertises `T`'s derived JSON Schema.
pub struct TypedSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> InputSchema for TypedSchema<T>
where
    T: DeserializeOwned + Serialize + JsonSchema + 'static,
{
    async fn validate(&self, input: Value) -> Result<Value, Vec<ValidationIssue>> {
        let parsed: T = serde_json::from_value(input)
            .map_err(|err| vec![ValidationIssue::new(err.to_string())])?;
        serde_json::to_value(parsed).map_err(|err| vec![ValidationIssue::new(err.to_string())])
    }

    async fn json_schema(&self) -> Result<Value, SchemaError> {
        Ok(serde_json::to_value(schema_for!(T))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, JsonSchema)]
    struct EchoInput {
        input: String,
    }

    #[tokio::test]
    async fn typed_schema_accepts_valid_input() {
        let schema = TypedSchema::<EchoInput>::new();
        let value = schema
            .validate(json!({"input": "hi"}))
            .await
            .expect("valid input");
        assert_eq!(value, json!({"input": "hi"}));
    }

    #[tokio::test]
    async fn typed_schema_reports_issues() {
        let schema = TypedSchema::<EchoInput>::new();
        let issues = schema
            .validate(json!({"input": 5}))
            .await
            .expect_err("wrong type");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("invalid type"));

        let issues = schema.validate(Value::Null).await.expect_err("missing");
        assert!(!issues.is_empty());
    }

    #[tokio::test]
    async fn typed_schema_derives_required_string_property() {
        let schema = TypedSchema::<EchoInput>::new()
            .json_schema()
            .await
            .expect("schema");
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["input"]["type"], "string");
        assert_eq!(schema["required"], json!(["input"]));
    }
}
