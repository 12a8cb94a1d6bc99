//! Module registry — built-in registration plus external-module discovery.
//!
//! Populated once at startup and read-only afterwards; shared as
//! `Arc<ModuleRegistry>` with the request processor and worker tasks.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::{Echo, ExternalModule, Inventory, Module, Ping};

pub struct ModuleRegistry {
    modules: BTreeMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Registry with only the built-in modules.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            modules: BTreeMap::new(),
        };
        registry.insert(Arc::new(Echo::new()));
        registry.insert(Arc::new(Inventory::new()));
        registry.insert(Arc::new(Ping::new()));
        registry
    }

    /// Register a module, replacing any previous one with the same name.
    pub fn insert(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Scan `dir` and load every regular file as an external module.
    ///
    /// A file that fails introspection is logged and skipped; a missing
    /// directory is not an error (the agent just has no external modules).
    pub async fn load_external_dir(&mut self, dir: &Path) {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                info!(
                    dir = %dir.display(),
                    error = %e,
                    "external modules directory not readable — skipping"
                );
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }

            match ExternalModule::load(&path).await {
                Ok(module) => {
                    info!(module = %module.name(), path = %path.display(), "loaded external module");
                    self.insert(Arc::new(module));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load external module");
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Log the loaded module/action table at info level.
    pub fn log_summary(&self) {
        if self.is_empty() {
            warn!("no modules registered — every request will be rejected");
            return;
        }
        info!("loaded modules:");
        for (name, module) in &self.modules {
            let actions = module.actions().keys().cloned().collect::<Vec<_>>();
            info!("  {name}: {}", actions.join(", "));
        }
    }
}
