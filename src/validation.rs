use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// A request to validate a document for an editorial action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidateRequest {
    /// The action being attempted (`publish`, ...).
    pub act: String,
    /// Content type of the document.
    #[serde(rename = "type")]
    pub doc_type: String,
    /// The full document.
    pub validate: Value,
}

/// Validation rule engine. An empty result means the document passes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, request: &ValidateRequest) -> Result<Vec<String>, AppError>;
}

/// Rules applied to documents of one type for one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub act: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    /// Fields that must be present and non-empty.
    #[serde(default)]
    pub required: Vec<String>,
    /// Maximum length in characters of string fields.
    #[serde(default)]
    pub max_length: BTreeMap<String, usize>,
}

impl ValidationRule {
    pub fn new(act: &str, doc_type: &str, required: &[&str]) -> Self {
        Self {
            act: act.to_string(),
            doc_type: doc_type.to_string(),
            required: required.iter().map(|f| f.to_string()).collect(),
            max_length: BTreeMap::new(),
        }
    }
}

/// Validator driven by per-type rules from configuration.
#[derive(Debug, Clone, Default)]
pub struct ProfileValidator {
    rules: Vec<ValidationRule>,
}

impl ProfileValidator {
    pub fn new(rules: Vec<ValidationRule>) -> Self {
        Self { rules }
    }

    fn check(rule: &ValidationRule, doc: &Value, errors: &mut Vec<String>) {
        for field in &rule.required {
            let present = match doc.get(field) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(Value::Array(a)) => !a.is_empty(),
                Some(Value::Object(o)) => !o.is_empty(),
                Some(_) => true,
            };
            if !present {
                errors.push(format!("{} is a required field", field.to_uppercase()));
            }
        }
        for (field, max) in &rule.max_length {
            if let Some(Value::String(s)) = doc.get(field) {
                if s.chars().count() > *max {
                    errors.push(format!("{} is too long", field.to_uppercase()));
                }
            }
        }
    }
}

#[async_trait]
impl Validator for ProfileValidator {
    async fn validate(&self, request: &ValidateRequest) -> Result<Vec<String>, AppError> {
        let rules: Vec<&ValidationRule> = self
            .rules
            .iter()
            .filter(|r| r.act == request.act && r.doc_type == request.doc_type)
            .collect();

        if rules.is_empty() {
            return Ok(vec![format!("validator was not found for {}", request.act)]);
        }

        let mut errors = Vec::new();
        for rule in rules {
            Self::check(rule, &request.validate, &mut errors);
        }
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> ProfileValidator {
        let mut rule = ValidationRule::new("publish", "text", &["headline", "slugline"]);
        rule.max_length.insert("slugline".into(), 10);
        ProfileValidator::new(vec![rule])
    }

    fn request(doc_type: &str, doc: Value) -> ValidateRequest {
        ValidateRequest {
            act: "publish".into(),
            doc_type: doc_type.into(),
            validate: doc,
        }
    }

    #[tokio::test]
    async fn test_valid_document() {
        let errors = validator()
            .validate(&request("text", json!({"headline": "Flood", "slugline": "flood"})))
            .await
            .unwrap();
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_missing_and_too_long_fields() {
        let errors = validator()
            .validate(&request("text", json!({"headline": " ", "slugline": "much-too-long-slug"})))
            .await
            .unwrap();
        assert_eq!(errors, vec!["HEADLINE is a required field", "SLUGLINE is too long"]);
    }

    #[tokio::test]
    async fn test_unknown_type_has_no_validator() {
        let errors = validator()
            .validate(&request("video", json!({})))
            .await
            .unwrap();
        assert_eq!(errors, vec!["validator was not found for publish"]);
    }

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_value(request("text", json!({"a": 1}))).unwrap();
        assert_eq!(json["act"], "publish");
        assert_eq!(json["type"], "text");
        assert_eq!(json["validate"]["a"], 1);
    }

    #[test]
    fn test_rule_from_config_defaults() {
        let rule: ValidationRule =
            serde_json::from_value(json!({"act": "publish", "type": "picture"})).unwrap();
        assert!(rule.required.is_empty());
        assert!(rule.max_length.is_empty());
    }
}
