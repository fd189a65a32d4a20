//! Tool seam.
//!
//! Tools are synchronous, take a JSON argument object, and return text.
//! The driver only consults the planner when at least one tool is registered.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::errors::Result;

/// A callable tool.
pub trait Tool: Send + Sync {
    /// Unique name the planner refers to.
    fn name(&self) -> &str;

    /// One-line description shown to the planner.
    fn description(&self) -> &str;

    /// Run with planner-supplied arguments.
    fn run(&self, arguments: &Map<String, Value>) -> Result<String>;
}

/// Tools keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let _ = self.tools.insert(tool.name().to_owned(), tool);
    }

    #[must_use]
    /// Look a tool up by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// `(name, description)` pairs sorted by name.
    #[must_use]
    pub fn descriptions(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .tools
            .values()
            .map(|t| (t.name(), t.description()))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    #[must_use]
    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.descriptions().into_iter().map(|(n, _)| n).collect();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}
