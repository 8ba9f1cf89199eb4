use crate::types::ToolCall;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Client-side implementation of a function the assistant may call.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<String>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> Result<String> + Send + Sync,
{
    async fn call(&self, arguments: Value) -> Result<String> {
        (self.0)(arguments)
    }
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: impl ToolHandler + 'static) {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Result<String> + Send + Sync + 'static,
    {
        self.register(name, FnHandler(handler));
    }

    pub async fn invoke(&self, call: &ToolCall) -> Result<String> {
        let name = call.function.name.as_str();
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| anyhow!("No handler registered for tool '{name}'"))?;

        let raw = call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw)
                .with_context(|| format!("Invalid arguments for tool '{name}'"))?
        };

        handler.call(arguments).await
    }
}
