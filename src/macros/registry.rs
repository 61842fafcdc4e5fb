use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::resource::service::Resources;

/// Where a macro may be triggered from. Only client-triggered macros ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Frontend,
}

/// How the macro result is applied. Results are applied as returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacroDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub access_type: AccessType,
    pub action_type: ActionType,
}

/// An editorial macro: takes an item and returns it, possibly changed.
#[async_trait]
pub trait Macro: Send + Sync {
    fn descriptor(&self) -> &MacroDescriptor;

    async fn call(
        &self,
        resources: &Resources,
        item: Map<String, Value>,
    ) -> Result<Map<String, Value>, AppError>;
}

/// Macros available to clients, by name.
#[derive(Default)]
pub struct MacroRegistry {
    macros: BTreeMap<&'static str, Arc<dyn Macro>>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, m: Arc<dyn Macro>) -> Self {
        self.macros.insert(m.descriptor().name, m);
        self
    }

    pub fn descriptors(&self) -> Vec<&MacroDescriptor> {
        self.macros.values().map(|m| m.descriptor()).collect()
    }

    /// Run a macro by name.
    pub async fn execute(
        &self,
        name: &str,
        resources: &Resources,
        item: Map<String, Value>,
    ) -> Result<Map<String, Value>, AppError> {
        let m = self
            .macros
            .get(name)
            .ok_or_else(|| AppError::NotFound(format!("macro '{name}'")))?;
        tracing::debug!(name, "running macro");
        m.call(resources, item).await
    }
}
