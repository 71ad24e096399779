//! The host-facing plugin manager.
//!
//! [`PluginManager`] is the stable surface host applications program
//! against: search directories, load, query, unload. One process-global
//! instance exists because the request trampoline handed to plugin
//! factories is a plain function pointer with no closure; it must be able
//! to find the registry on its own. Hosts that only ever talk to the
//! manager directly may also construct private instances (tests do), but
//! request routing always targets the global one.
//!
//! All plugin callbacks — factories, `loaded`, `about_to_be_unloaded`,
//! `handle_request` — run with the registry lock released, so a plugin may
//! send requests from inside its own lifecycle callbacks.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::{debug, warn};

use crate::api::Plugin;
use crate::discovery;
use crate::error::ReturnCode;
use crate::library::{DiskLoader, LibraryLoader};
use crate::loader;
use crate::manifest::{PluginInfo, PLUGIN_API};
use crate::registry::PluginRegistry;
use crate::router;

const MANAGER_TARGET: &str = "jackplug::manager";

static INSTANCE: OnceLock<PluginManager> = OnceLock::new();

/// Discovers, loads, routes and unloads native shared-library plugins.
///
/// # Example
///
/// ```rust,no_run
/// use jackplug::{PluginManager, ReturnCode};
///
/// let manager = PluginManager::instance();
/// manager.search_with("./plugins", true, |code, detail| {
///     eprintln!("search event: {code} ({detail:?})");
/// });
/// if manager.load().is_success() {
///     assert!(manager.is_plugin_loaded("alpha") || manager.plugins_count() == 0);
/// }
/// manager.unload();
/// ```
pub struct PluginManager {
    registry: Mutex<PluginRegistry>,
    loader: Mutex<Box<dyn LibraryLoader>>,
}

impl PluginManager {
    /// Returns the process-global manager, created on first access.
    pub fn instance() -> &'static PluginManager {
        INSTANCE.get_or_init(PluginManager::default)
    }

    /// Creates a manager that obtains libraries from `loader` instead of
    /// the platform dynamic linker.
    #[must_use]
    pub fn with_loader(loader: Box<dyn LibraryLoader>) -> Self {
        Self {
            registry: Mutex::new(PluginRegistry::new()),
            loader: Mutex::new(loader),
        }
    }

    /// Replaces the library provider. Affects subsequent searches only.
    pub fn set_library_loader(&self, loader: Box<dyn LibraryLoader>) {
        *self
            .loader
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = loader;
    }

    pub(crate) fn lock_registry(&self) -> MutexGuard<'_, PluginRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------------

    /// Searches `dir` (non-recursively) for plugins, discarding events.
    pub fn search(&self, dir: impl AsRef<Path>) -> ReturnCode {
        self.search_with(dir, false, |_, _| {})
    }

    /// Searches `dir` for plugin libraries and registers what qualifies.
    ///
    /// Per-candidate failures are delivered through `on_event` together
    /// with a detail string (a path or a scan error description); the
    /// returned code summarises the call as a whole.
    pub fn search_with<F>(&self, dir: impl AsRef<Path>, recursive: bool, mut on_event: F) -> ReturnCode
    where
        F: FnMut(ReturnCode, Option<String>),
    {
        let loader = self.loader.lock().unwrap_or_else(PoisonError::into_inner);
        let mut registry = self.lock_registry();
        discovery::search(
            &mut registry,
            loader.as_ref(),
            dir.as_ref(),
            recursive,
            &mut on_event,
        )
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    /// Loads every registered plugin whose dependencies are satisfied,
    /// continuing past individual failures and discarding events.
    pub fn load(&self) -> ReturnCode {
        self.load_with(true, |_, _| {})
    }

    /// Resolves dependencies, orders the registry topologically and
    /// instantiates plugins in that order.
    ///
    /// Already-instantiated plugins are left untouched, so repeated calls
    /// are safe and pick up newly discovered plugins. With
    /// `continue_on_error` unset the call aborts on the first resolution
    /// failure; otherwise satisfiable plugins still load and the first
    /// failure code becomes the summary result.
    pub fn load_with<F>(&self, continue_on_error: bool, mut on_event: F) -> ReturnCode
    where
        F: FnMut(ReturnCode, Option<String>),
    {
        let (order, mut pending) = {
            let mut registry = self.lock_registry();
            match loader::resolve(&mut registry, continue_on_error, &mut on_event) {
                Ok(resolution) => {
                    registry.set_load_order(resolution.order.clone());
                    (resolution.order, resolution.first_failure)
                }
                Err(code) => return code,
            }
        };

        for name in &order {
            // Take the handle out so the factory runs without the lock.
            let taken = {
                let mut registry = self.lock_registry();
                registry.record_mut(name).and_then(|record| {
                    if record.is_instantiated() {
                        None
                    } else {
                        record
                            .take_library()
                            .map(|library| (library, record.path().to_path_buf()))
                    }
                })
            };
            let Some((library, path)) = taken else {
                continue;
            };

            let constructed = library.instantiate(router::request_trampoline);
            let instance = {
                let mut registry = self.lock_registry();
                match registry.record_mut(name) {
                    Some(record) => {
                        record.restore_library(library);
                        match constructed {
                            Ok(instance) => {
                                record.set_instance(instance.clone());
                                Some(instance)
                            }
                            Err(error) => {
                                warn!(
                                    target: MANAGER_TARGET,
                                    plugin = %name,
                                    error = %error,
                                    "plugin construction failed"
                                );
                                on_event(
                                    ReturnCode::UnknownError,
                                    Some(path.display().to_string()),
                                );
                                pending.get_or_insert(ReturnCode::UnknownError);
                                None
                            }
                        }
                    }
                    None => None,
                }
            };

            if let Some(instance) = instance {
                debug!(target: MANAGER_TARGET, plugin = %name, "plugin loaded");
                instance.loaded();
            }
        }

        pending.unwrap_or(ReturnCode::Success)
    }

    // -----------------------------------------------------------------------
    // Unload
    // -----------------------------------------------------------------------

    /// Unloads all plugins, discarding events.
    pub fn unload(&self) -> ReturnCode {
        self.unload_with(|_, _| {})
    }

    /// Tears down every plugin: loaded ones in the exact reverse of the
    /// load order, then residual records in arbitrary order, each with the
    /// notify-instance, drop-instance, close-library discipline. The
    /// locations list is cleared.
    pub fn unload_with<F>(&self, mut on_event: F) -> ReturnCode
    where
        F: FnMut(ReturnCode, Option<String>),
    {
        let mut all_released = true;

        loop {
            let popped = self.lock_registry().pop_loaded_record();
            let Some((name, mut record)) = popped else {
                break;
            };
            debug!(target: MANAGER_TARGET, plugin = %name, "unloading plugin");
            if !record.teardown() {
                all_released = false;
            }
        }

        loop {
            let popped = self.lock_registry().pop_any_record();
            let Some((name, mut record)) = popped else {
                break;
            };
            debug!(target: MANAGER_TARGET, plugin = %name, "destroying residual record");
            if !record.teardown() {
                all_released = false;
            }
        }

        self.lock_registry().clear_locations();

        if all_released {
            ReturnCode::Success
        } else {
            on_event(ReturnCode::UnloadNotAll, None);
            ReturnCode::UnloadNotAll
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Returns the number of registered plugins.
    #[must_use]
    pub fn plugins_count(&self) -> usize {
        self.lock_registry().len()
    }

    /// Returns the registered plugin names.
    #[must_use]
    pub fn plugins_list(&self) -> Vec<String> {
        self.lock_registry().names()
    }

    /// Returns the searched locations in insertion order, deduplicated.
    #[must_use]
    pub fn plugins_locations(&self) -> Vec<PathBuf> {
        self.lock_registry().locations().to_vec()
    }

    /// Returns `true` when `name` is registered.
    #[must_use]
    pub fn has_plugin(&self, name: &str) -> bool {
        self.lock_registry().contains(name)
    }

    /// Returns `true` when `name` is registered in a version compatible
    /// with `min_version`.
    #[must_use]
    pub fn has_plugin_version(&self, name: &str, min_version: &str) -> bool {
        self.lock_registry()
            .record(name)
            .is_some_and(|record| crate::version::compatible(record.info().version(), min_version))
    }

    /// Returns `true` when `name` is registered, its library is open and
    /// its instance exists.
    #[must_use]
    pub fn is_plugin_loaded(&self, name: &str) -> bool {
        self.lock_registry()
            .record(name)
            .is_some_and(|record| record.is_open() && record.is_instantiated())
    }

    /// Returns an owned snapshot of the plugin's manifest metadata.
    #[must_use]
    pub fn plugin_info(&self, name: &str) -> Option<PluginInfo> {
        self.lock_registry()
            .record(name)
            .map(|record| record.info().clone())
    }

    /// Returns a shared handle to the plugin instance, if instantiated.
    ///
    /// The handle stays valid until [`unload`](Self::unload) is called.
    #[must_use]
    pub fn plugin_object(&self, name: &str) -> Option<std::sync::Arc<dyn Plugin>> {
        self.lock_registry()
            .record(name)
            .and_then(|record| record.instance().cloned())
    }

    /// Returns the plugin instance downcast to a concrete type, or `None`
    /// when the plugin is absent, not instantiated, or of another type.
    #[must_use]
    pub fn plugin_object_as<T: Plugin>(&self, name: &str) -> Option<std::sync::Arc<T>> {
        self.plugin_object(name)?.as_any().downcast::<T>().ok()
    }

    /// Returns the directory holding the running executable.
    #[must_use]
    pub fn app_directory() -> Option<PathBuf> {
        std::env::current_exe()
            .ok()?
            .parent()
            .map(Path::to_path_buf)
    }

    /// Returns the plugin API version compiled into this host.
    #[must_use]
    pub const fn plugin_api() -> &'static str {
        PLUGIN_API
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::with_loader(Box::new(DiskLoader))
    }
}
