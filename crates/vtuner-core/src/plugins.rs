//! Plugin registry.
//!
//! A plugin is described by a `plugin.json` manifest in its own directory
//! under `plugins.dir`. The registry only knows names, kinds, and versions;
//! loading plugin behaviour is the job of the service that uses it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};

/// Name of the EPG plugin that ships with the tuner.
pub const BUILTIN_EPG: &str = "blocks";

/// Role a plugin plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    /// Supplies channels and streams.
    Origin,
    /// Supplies program guide data.
    Epg,
    /// Extends the HTTP interface.
    Interface,
}

/// Plugin manifest as found in `plugin.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique plugin name.
    pub name: String,
    /// Role of the plugin.
    pub kind: PluginKind,
    /// Plugin version string.
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

/// Registry of known plugins, keyed by name.
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, PluginManifest>,
}

impl PluginRegistry {
    /// Creates a registry holding only the builtin plugins.
    #[must_use]
    pub fn builtin() -> Self {
        let mut plugins = BTreeMap::new();
        plugins.insert(
            BUILTIN_EPG.to_string(),
            PluginManifest {
                name: BUILTIN_EPG.to_string(),
                kind: PluginKind::Epg,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        );
        Self { plugins }
    }

    /// Builds the registry from the builtins plus every `*/plugin.json` under `dir`.
    ///
    /// # Errors
    /// Returns an error if `dir` cannot be listed, a manifest is malformed,
    /// or two plugins share a name.
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let mut registry = Self::builtin();
        let Some(dir) = dir else {
            return Ok(registry);
        };

        let entries = std::fs::read_dir(dir).map_err(|e| {
            TunerError::Plugin(format!("failed to list {}: {e}", dir.display()))
        })?;

        let mut manifests: Vec<_> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path().join("plugin.json"))
            .filter(|path| path.is_file())
            .collect();
        manifests.sort();

        for path in manifests {
            let content = std::fs::read_to_string(&path)?;
            let manifest: PluginManifest = serde_json::from_str(&content).map_err(|e| {
                TunerError::Plugin(format!("invalid manifest {}: {e}", path.display()))
            })?;
            registry.register(manifest)?;
        }

        tracing::debug!(dir = %dir.display(), count = registry.len(), "loaded plugins");
        Ok(registry)
    }

    /// Adds a plugin.
    ///
    /// # Errors
    /// Returns an error if a plugin with the same name is already registered.
    pub fn register(&mut self, manifest: PluginManifest) -> Result<()> {
        if self.plugins.contains_key(&manifest.name) {
            return Err(TunerError::Plugin(format!(
                "plugin {} already registered",
                manifest.name
            )));
        }
        self.plugins.insert(manifest.name.clone(), manifest);
        Ok(())
    }

    /// Looks a plugin up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PluginManifest> {
        self.plugins.get(name)
    }

    /// Iterates over plugins of one kind, in name order.
    pub fn of_kind(&self, kind: PluginKind) -> impl Iterator<Item = &PluginManifest> {
        self.plugins.values().filter(move |p| p.kind == kind)
    }

    /// Returns the number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true if no plugins are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(root: &Path, dir: &str, body: &str) {
        let plugin_dir = root.join(dir);
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(plugin_dir.join("plugin.json"), body).unwrap();
    }

    #[test]
    fn test_builtin_has_blocks_epg() {
        let registry = PluginRegistry::builtin();
        assert_eq!(registry.len(), 1);
        let blocks = registry.get(BUILTIN_EPG).unwrap();
        assert_eq!(blocks.kind, PluginKind::Epg);
    }

    #[test]
    fn test_load_without_dir() {
        let registry = PluginRegistry::load(None).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_load_manifests() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            "locast",
            r#"{"name": "locast", "kind": "origin", "version": "1.2.0"}"#,
        );
        write_manifest(dir.path(), "zap2it", r#"{"name": "zap2it", "kind": "epg"}"#);
        std::fs::create_dir_all(dir.path().join("not-a-plugin")).unwrap();

        let registry = PluginRegistry::load(Some(dir.path())).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("locast").unwrap().version, "1.2.0");
        assert_eq!(registry.get("zap2it").unwrap().version, "0.0.0");

        let epg: Vec<_> = registry
            .of_kind(PluginKind::Epg)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(epg, vec!["blocks", "zap2it"]);
    }

    #[test]
    fn test_load_malformed_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "broken", r#"{"name": "broken"}"#);
        let err = PluginRegistry::load(Some(dir.path())).unwrap_err();
        assert!(matches!(err, TunerError::Plugin(_)));
    }

    #[test]
    fn test_load_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = PluginRegistry::load(Some(&dir.path().join("nope"))).unwrap_err();
        assert!(matches!(err, TunerError::Plugin(_)));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = PluginRegistry::builtin();
        let err = registry
            .register(PluginManifest {
                name: BUILTIN_EPG.to_string(),
                kind: PluginKind::Epg,
                version: "9.9.9".to_string(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }
}
