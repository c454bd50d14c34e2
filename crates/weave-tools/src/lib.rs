// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod registry;
pub mod sanitize;
pub mod tool;

pub use builtin::{VectorSearchTool, VectorUpsertTool};
pub use registry::ToolRegistry;
pub use sanitize::{validate_prompt, InvalidPrompt};
pub use tool::{Tool, ToolCtx, ToolError};

/// Build the registry of tools every agent gets by default.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(std::sync::Arc::new(VectorUpsertTool));
    registry.register(std::sync::Arc::new(VectorSearchTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_the_builtin_memory_tools() {
        let registry = default_registry();
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["vector_search", "vector_upsert"]);
    }
}
