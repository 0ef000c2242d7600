//! Tool registry: every available `Tool`, addressable by name

use crate::error::{Error, Result};
use crate::plugin::Tool;
use crate::provision::ProvisionerConfig;
use crate::tools;
use std::collections::BTreeMap;

pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry of the built-in tool table
    pub fn discover(provisioner: &ProvisionerConfig) -> Result<Self> {
        let registry = Self::from_tools(tools::builtin(provisioner))?;
        tracing::debug!("Registered tools: {}", registry.names().join(", "));
        Ok(registry)
    }

    /// Build a registry, failing on the first duplicated name
    pub fn from_tools(list: Vec<Box<dyn Tool>>) -> Result<Self> {
        let mut tools = BTreeMap::new();
        for tool in list {
            let name = tool.name().to_string();
            if tools.contains_key(&name) {
                return Err(Error::DuplicateTool { name });
            }
            tools.insert(name, tool);
        }
        Ok(Self { tools })
    }

    pub fn get(&self, name: &str) -> Result<&dyn Tool> {
        self.tools
            .get(name)
            .map(|tool| tool.as_ref())
            .ok_or_else(|| Error::ToolNotFound {
                name: name.to_string(),
                known: self.tools.keys().cloned().collect(),
            })
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.values().map(|tool| tool.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
