use std::collections::HashMap;
use std::sync::Mutex;

use agent_proxmox_ve::{ApiSource, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

/// Proxmox VE API answering from canned elements, keyed by request path.
///
/// Unknown paths answer with an empty list, like API directories without
/// entries.
#[derive(Default)]
pub struct MockApi {
    elements: HashMap<String, Value>,
    requested: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn new<'a>(elements: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        Self {
            elements: elements
                .into_iter()
                .map(|(path, value)| (path.to_string(), value))
                .collect(),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn with_element(mut self, path: &str, value: Value) -> Self {
        self.elements.insert(path.to_string(), value);
        self
    }

    /// Every path requested so far, in order
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|requested| requested.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self, path: &str) -> usize {
        self.requested().iter().filter(|p| p.as_str() == path).count()
    }
}

#[async_trait]
impl ApiSource for MockApi {
    async fn get_api_element(&self, path: &str) -> Result<Value> {
        debug!("GET {}", path);
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(path.to_string());
        }
        Ok(self.elements.get(path).cloned().unwrap_or_else(|| json!([])))
    }
}
