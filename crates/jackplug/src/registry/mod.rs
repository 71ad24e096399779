//! Per-plugin records and the name-keyed registry.
//!
//! A [`PluginRecord`] is created during discovery once a library's signature
//! symbols have been verified, mutated only by the load pass (dependency
//! status, graph id, instance) and destroyed during unload. The
//! [`PluginRegistry`] owns every record, remembers the registration order
//! (which makes load ordering deterministic), the searched locations, and
//! the load order produced by the most recent successful load pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::Plugin;
use crate::library::PluginLibrary;
use crate::manifest::PluginInfo;

/// Memoized result of the dependency satisfaction check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepStatus {
    /// Not checked yet in the current load pass.
    #[default]
    Unknown,
    /// Every declared dependency resolves, transitively, in a compatible
    /// version.
    Ok,
    /// At least one declared dependency is not registered.
    Missing,
    /// At least one declared dependency is registered in an incompatible
    /// version.
    BadVersion,
}

/// Mutable per-plugin state owned by the registry.
pub struct PluginRecord {
    info: PluginInfo,
    path: PathBuf,
    library: Option<Box<dyn PluginLibrary>>,
    instance: Option<Arc<dyn Plugin>>,
    dep_status: DepStatus,
    graph_id: Option<usize>,
}

impl PluginRecord {
    pub(crate) fn new(info: PluginInfo, path: PathBuf, library: Box<dyn PluginLibrary>) -> Self {
        Self {
            info,
            path,
            library: Some(library),
            instance: None,
            dep_status: DepStatus::Unknown,
            graph_id: None,
        }
    }

    /// Returns the manifest snapshot.
    #[must_use]
    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    /// Returns the path the library was discovered at.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the memoized dependency status.
    #[must_use]
    pub fn dep_status(&self) -> DepStatus {
        self.dep_status
    }

    pub(crate) fn set_dep_status(&mut self, status: DepStatus) {
        self.dep_status = status;
    }

    /// Returns the node index assigned during the current load pass.
    #[must_use]
    pub fn graph_id(&self) -> Option<usize> {
        self.graph_id
    }

    pub(crate) fn set_graph_id(&mut self, id: Option<usize>) {
        self.graph_id = id;
    }

    /// Returns the plugin instance, if instantiated.
    #[must_use]
    pub fn instance(&self) -> Option<&Arc<dyn Plugin>> {
        self.instance.as_ref()
    }

    /// Returns `true` once the plugin has been constructed.
    #[must_use]
    pub fn is_instantiated(&self) -> bool {
        self.instance.is_some()
    }

    pub(crate) fn set_instance(&mut self, instance: Arc<dyn Plugin>) {
        self.instance = Some(instance);
    }

    /// Returns `true` while the library handle is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.library.as_ref().is_some_and(|library| library.is_open())
    }

    pub(crate) fn take_library(&mut self) -> Option<Box<dyn PluginLibrary>> {
        self.library.take()
    }

    pub(crate) fn restore_library(&mut self, library: Box<dyn PluginLibrary>) {
        self.library = Some(library);
    }

    /// Releases the record's resources in the mandatory order: notify the
    /// instance, drop it, then close the library handle. Returns `true`
    /// when the handle is released.
    pub(crate) fn teardown(&mut self) -> bool {
        if let Some(instance) = self.instance.take() {
            instance.about_to_be_unloaded();
            drop(instance);
        }
        match self.library.as_mut() {
            Some(library) => library.close(),
            None => true,
        }
    }
}

impl Drop for PluginRecord {
    fn drop(&mut self) {
        if self.instance.is_some() || self.is_open() {
            self.teardown();
        }
    }
}

/// The in-memory set of plugin records keyed by name.
#[derive(Default)]
pub struct PluginRegistry {
    records: HashMap<String, PluginRecord>,
    registration_order: Vec<String>,
    locations: Vec<PathBuf>,
    load_order: Vec<String>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when no plugin is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns `true` when `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Looks up a record by name.
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&PluginRecord> {
        self.records.get(name)
    }

    pub(crate) fn record_mut(&mut self, name: &str) -> Option<&mut PluginRecord> {
        self.records.get_mut(name)
    }

    /// Registers a record under `name`. Returns `false` when the name is
    /// already taken, leaving the existing record untouched.
    pub(crate) fn insert(&mut self, name: impl Into<String>, record: PluginRecord) -> bool {
        let name = name.into();
        if self.records.contains_key(&name) {
            return false;
        }
        self.registration_order.push(name.clone());
        self.records.insert(name, record);
        true
    }

    /// Returns the registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.registration_order.clone()
    }

    /// Removes the most recently loaded plugin and returns it, skipping
    /// names that are no longer registered.
    pub(crate) fn pop_loaded_record(&mut self) -> Option<(String, PluginRecord)> {
        while let Some(name) = self.load_order.pop() {
            if let Some(record) = self.remove(&name) {
                return Some((name, record));
            }
        }
        None
    }

    /// Removes an arbitrary residual record and returns it.
    pub(crate) fn pop_any_record(&mut self) -> Option<(String, PluginRecord)> {
        let name = self.registration_order.first()?.clone();
        let record = self.remove(&name)?;
        Some((name, record))
    }

    fn remove(&mut self, name: &str) -> Option<PluginRecord> {
        let record = self.records.remove(name)?;
        self.registration_order.retain(|n| n != name);
        Some(record)
    }

    /// Appends `dir` to the searched locations unless already present.
    pub(crate) fn add_location(&mut self, dir: &Path) {
        if !self.locations.iter().any(|d| d == dir) {
            self.locations.push(dir.to_path_buf());
        }
    }

    /// Returns the searched locations in insertion order, deduplicated.
    #[must_use]
    pub fn locations(&self) -> &[PathBuf] {
        &self.locations
    }

    pub(crate) fn clear_locations(&mut self) {
        self.locations.clear();
    }

    /// Returns the load order produced by the most recent load pass.
    #[must_use]
    pub fn load_order(&self) -> &[String] {
        &self.load_order
    }

    pub(crate) fn set_load_order(&mut self, order: Vec<String>) {
        self.load_order = order;
    }
}
