use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::db::models::ID_FIELD;
use crate::error::AppError;
use crate::highlights::service::ARCHIVE;
use crate::macros::registry::{AccessType, ActionType, Macro, MacroDescriptor};
use crate::resource::service::Resources;
use crate::validation::{ValidateRequest, Validator};

pub const ITEM_PUBLISH: &str = "publish";

static DESCRIPTOR: MacroDescriptor = MacroDescriptor {
    name: "validate_for_publish",
    label: "Validate for Publish",
    access_type: AccessType::Frontend,
    action_type: ActionType::Direct,
};

/// Check an item against the publish rules before it goes out.
///
/// Violations abort with `AppError::Validation` carrying them as JSON. On
/// success the item reference is handed back untouched.
pub async fn validate_for_publish(
    resources: &Resources,
    validator: &dyn Validator,
    item: Map<String, Value>,
) -> Result<Map<String, Value>, AppError> {
    let id = item
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("item reference has no _id".into()))?;

    let doc = resources
        .service(ARCHIVE)?
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("item '{id}'")))?;

    let request = ValidateRequest {
        act: ITEM_PUBLISH.to_string(),
        doc_type: doc.get_str("type").unwrap_or_default().to_string(),
        validate: doc.to_value(),
    };

    let errors = validator.validate(&request).await?;
    if !errors.is_empty() {
        tracing::info!(item = %id, violations = errors.len(), "item failed publish validation");
        let payload = serde_json::to_string(&errors)
            .map_err(|e| AppError::Internal(format!("Failed to serialize violations: {e}")))?;
        return Err(AppError::Validation(payload));
    }

    Ok(item)
}

pub struct ValidateForPublish {
    validator: Arc<dyn Validator>,
}

impl ValidateForPublish {
    pub fn new(validator: Arc<dyn Validator>) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl Macro for ValidateForPublish {
    fn descriptor(&self) -> &MacroDescriptor {
        &DESCRIPTOR
    }

    async fn call(
        &self,
        resources: &Resources,
        item: Map<String, Value>,
    ) -> Result<Map<String, Value>, AppError> {
        validate_for_publish(resources, self.validator.as_ref(), item).await
    }
}
