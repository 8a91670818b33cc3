//! # Asset Registry
//!
//! The wallet's local moniker → definition map. Registry operations never
//! touch the ledger: defining an asset records an interpretation, removing
//! one forgets it, and neither changes what any transaction means.
//!
//! The registry is concurrent — balance refreshes look assets up while an
//! import is in flight — and export/restore round-trips through JSON so
//! the node can persist it in the store's metadata tree.

use std::collections::BTreeMap;

use dashmap::DashMap;

use crate::graph::OutPoint;
use crate::kernel::KernelId;

use super::definition::{AssetDefinition, AssetError};

/// Concurrent moniker-keyed registry of asset definitions.
///
/// Share via `Arc`. Definitions are immutable once registered; the only
/// mutations are insertion and removal of whole entries.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    assets: DashMap<String, AssetDefinition>,
}

impl AssetRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new asset under a fresh moniker.
    ///
    /// # Errors
    ///
    /// [`AssetError::DuplicateMoniker`] if the moniker is taken,
    /// [`AssetError::InvalidMoniker`] if it fails validation.
    pub fn define(
        &self,
        moniker: impl Into<String>,
        genesis: OutPoint,
        kernel: KernelId,
    ) -> Result<AssetDefinition, AssetError> {
        let definition = AssetDefinition::new(moniker, genesis, kernel)?;
        self.insert(definition.clone())?;
        Ok(definition)
    }

    /// Imports a definition shared by another wallet as a descriptor
    /// string, binding it to a local moniker.
    pub fn import(
        &self,
        moniker: impl Into<String>,
        descriptor: &str,
    ) -> Result<AssetDefinition, AssetError> {
        let definition = AssetDefinition::from_descriptor(moniker, descriptor)?;
        self.insert(definition.clone())?;
        Ok(definition)
    }

    /// Looks up a definition by moniker.
    ///
    /// Fails with [`AssetError::AssetNotFound`] before any ledger access
    /// is attempted — an undefined moniker is a configuration problem,
    /// not a resolution problem.
    pub fn lookup(&self, moniker: &str) -> Result<AssetDefinition, AssetError> {
        self.assets
            .get(moniker)
            .map(|entry| entry.clone())
            .ok_or_else(|| AssetError::AssetNotFound(moniker.to_string()))
    }

    /// Forgets a definition. Registry-only; the ledger is untouched and
    /// the asset's history remains resolvable under a re-imported
    /// definition.
    pub fn remove(&self, moniker: &str) -> Result<AssetDefinition, AssetError> {
        self.assets
            .remove(moniker)
            .map(|(_, definition)| definition)
            .ok_or_else(|| AssetError::AssetNotFound(moniker.to_string()))
    }

    /// All registered definitions, sorted by moniker.
    pub fn list(&self) -> Vec<AssetDefinition> {
        let mut definitions: Vec<_> = self
            .assets
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        definitions.sort_by(|a, b| a.moniker.cmp(&b.moniker));
        definitions
    }

    /// Number of registered assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Serializes the registry as a JSON object of moniker → descriptor.
    ///
    /// `BTreeMap` keeps the output stable across runs, so persisted
    /// exports diff cleanly.
    pub fn export(&self) -> String {
        let map: BTreeMap<String, String> = self
            .assets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().descriptor()))
            .collect();
        // A string-to-string map cannot fail to serialize.
        serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
    }

    /// Restores definitions from an [`export`](Self::export) string,
    /// merging into the current registry.
    ///
    /// Fails on the first malformed descriptor or moniker collision;
    /// entries imported before the failure remain registered.
    pub fn restore(&self, exported: &str) -> Result<usize, AssetError> {
        let map: BTreeMap<String, String> = serde_json::from_str(exported)
            .map_err(|e| AssetError::BadDescriptor(format!("registry export: {e}")))?;
        let mut imported = 0;
        for (moniker, descriptor) in map {
            self.import(moniker, &descriptor)?;
            imported += 1;
        }
        Ok(imported)
    }

    fn insert(&self, definition: AssetDefinition) -> Result<(), AssetError> {
        // Entry-based insert keeps define/import atomic under concurrency:
        // two racing defines of one moniker cannot both succeed.
        match self.assets.entry(definition.moniker.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(AssetError::DuplicateMoniker(definition.moniker))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                tracing::info!(moniker = %definition.moniker, descriptor = %definition.descriptor(), "registered asset");
                slot.insert(definition);
                Ok(())
            }
        }
    }
}
