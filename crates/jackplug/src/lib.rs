//! Runtime manager for native shared-library plugins.
//!
//! The `jackplug` crate lets a host application extend itself at runtime with
//! independently built binary modules. It discovers candidate shared
//! libraries on disk, validates their embedded JSON manifests against the
//! host's plugin API version, resolves declared inter-plugin dependencies
//! through a directed graph with cycle detection, instantiates plugins in
//! topological order through a stable C-ABI entry point, brokers requests
//! between loaded plugins, and tears everything down in reverse order.
//!
//! # Architecture
//!
//! The [`PluginManager`] is a process-global facade over a registry of
//! [`PluginRecord`]s keyed by plugin name. Discovery walks directories
//! through a [`LibraryLoader`] implementation — [`DiskLoader`] in
//! production — and registers every library that exports the three
//! `jp_*` signature symbols with a parseable manifest. Loading checks each
//! record's dependencies, orders the satisfiable ones with a stable
//! topological sort, and constructs plugin instances through their exported
//! factories. While loaded, plugins address each other (and the manager)
//! through a fixed-signature request trampoline injected at construction.
//!
//! Plugin binaries declare their side of the contract with
//! [`declare_plugin!`]; see the [`api`] module for the ABI details.
//!
//! # Example
//!
//! ```rust,no_run
//! use jackplug::{PluginManager, ReturnCode};
//!
//! let manager = PluginManager::instance();
//! let code = manager.search("/usr/local/lib/my-app/plugins");
//! assert_eq!(code, ReturnCode::Success);
//!
//! let code = manager.load();
//! assert!(code.is_success());
//!
//! for name in manager.plugins_list() {
//!     println!("loaded: {name}");
//! }
//!
//! manager.unload();
//! ```

pub mod api;
pub mod error;
pub mod graph;
pub mod library;
pub mod manager;
pub mod manifest;
pub mod registry;
pub mod version;

pub(crate) mod discovery;
pub(crate) mod loader;
pub(crate) mod router;

#[cfg(test)]
mod tests;

pub use self::api::{
    Plugin, PluginConstructor, PluginHandle, PluginVTable, RequestSender, RequestTrampoline,
};
pub use self::error::{PluginError, ReturnCode};
pub use self::graph::{CycleDetected, DependencyGraph};
pub use self::library::{DiskLoader, Enumeration, LibraryLoader, PluginLibrary};
pub use self::manager::PluginManager;
pub use self::manifest::{PluginDependency, PluginInfo, PLUGIN_API};
pub use self::registry::{DepStatus, PluginRecord, PluginRegistry};
