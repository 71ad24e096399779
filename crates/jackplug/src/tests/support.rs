//! Shared fakes for exercising the manager without real shared objects.
//!
//! [`FakeLoader`] stands in for the platform dynamic linker behind the
//! [`LibraryLoader`] seam; [`RecordingPlugin`] journals every lifecycle
//! callback into a shared log so tests can assert exact invocation orders.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::api::{Plugin, RequestSender, RequestTrampoline};
use crate::error::PluginError;
use crate::library::{Enumeration, LibraryLoader, PluginLibrary};
use crate::manifest::{self, PluginInfo, PLUGIN_API};
use crate::registry::PluginRecord;

/// Chronological journal of plugin lifecycle events.
pub(crate) type SharedLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn new_log() -> SharedLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn log_entries(log: &SharedLog) -> Vec<String> {
    log.lock().expect("log lock").clone()
}

/// Builds a complete manifest document for a fake plugin.
pub(crate) fn manifest_json(name: &str, version: &str, deps: &[(&str, &str)]) -> String {
    let dependencies: Vec<serde_json::Value> = deps
        .iter()
        .map(|(dep_name, dep_version)| {
            serde_json::json!({ "name": dep_name, "version": dep_version })
        })
        .collect();
    serde_json::json!({
        "api": PLUGIN_API,
        "name": name,
        "prettyName": format!("Pretty {name}"),
        "version": version,
        "author": "tests",
        "url": "https://example.org",
        "license": "MIT",
        "copyright": "tests",
        "dependencies": dependencies,
    })
    .to_string()
}

pub(crate) fn parse_info(metadata: &str) -> PluginInfo {
    manifest::parse(metadata, PLUGIN_API).expect("test manifest parses")
}

/// Trampoline that swallows every request.
pub(crate) unsafe extern "C" fn noop_trampoline(
    _sender: *const std::ffi::c_char,
    _receiver: *const std::ffi::c_char,
    _code: u16,
    _data: *mut std::ffi::c_void,
    _data_size: *mut u32,
) -> u16 {
    0
}

// ---------------------------------------------------------------------------
// RecordingPlugin
// ---------------------------------------------------------------------------

/// Plugin double that journals lifecycle callbacks and answers requests
/// with a fixed reply code.
pub(crate) struct RecordingPlugin {
    name: String,
    log: SharedLog,
    requests: RequestSender,
    reply: u16,
    last_data: AtomicUsize,
}

impl RecordingPlugin {
    fn new(name: &str, log: SharedLog, trampoline: RequestTrampoline, reply: u16) -> Self {
        Self {
            name: name.to_owned(),
            log,
            requests: RequestSender::new(name, trampoline),
            reply,
            last_data: AtomicUsize::new(0),
        }
    }

    /// Issues a request through the injected trampoline.
    pub(crate) fn send(
        &self,
        receiver: Option<&str>,
        code: u16,
        data: *mut std::ffi::c_void,
        data_size: *mut u32,
    ) -> u16 {
        self.requests.send_request(receiver, code, data, data_size)
    }

    /// Returns the data pointer observed by the last handled request.
    pub(crate) fn last_data(&self) -> usize {
        self.last_data.load(Ordering::SeqCst)
    }

    fn record(&self, entry: String) {
        self.log.lock().expect("log lock").push(entry);
    }
}

impl Plugin for RecordingPlugin {
    fn loaded(&self) {
        self.record(format!("{}:loaded", self.name));
    }

    fn about_to_be_unloaded(&self) {
        self.record(format!("{}:unloaded", self.name));
    }

    fn handle_request(
        &self,
        sender: &str,
        code: u16,
        data: *mut std::ffi::c_void,
        _data_size: *mut u32,
    ) -> u16 {
        self.last_data.store(data as usize, Ordering::SeqCst);
        self.record(format!("{}:request:{sender}:{code}", self.name));
        self.reply
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn std::any::Any + Send + Sync> {
        self
    }
}

// ---------------------------------------------------------------------------
// Fake libraries
// ---------------------------------------------------------------------------

type Constructor = Arc<dyn Fn(RequestTrampoline) -> Arc<dyn Plugin> + Send + Sync>;

/// Blueprint describing what a fake library exports.
#[derive(Clone)]
pub(crate) struct FakeLibrarySpec {
    name: Option<String>,
    metadata: Option<String>,
    constructor: Option<Constructor>,
    close_ok: bool,
    broken_factory: bool,
}

impl FakeLibrarySpec {
    /// A qualifying plugin library backed by a [`RecordingPlugin`].
    pub(crate) fn plugin(name: &str, metadata: &str, log: &SharedLog) -> Self {
        Self::plugin_with_reply(name, metadata, log, 0)
    }

    /// Same as [`FakeLibrarySpec::plugin`] with a fixed request reply code.
    pub(crate) fn plugin_with_reply(
        name: &str,
        metadata: &str,
        log: &SharedLog,
        reply: u16,
    ) -> Self {
        let log = Arc::clone(log);
        let plugin_name = name.to_owned();
        Self {
            name: Some(name.to_owned()),
            metadata: Some(metadata.to_owned()),
            constructor: Some(Arc::new(move |trampoline| {
                let plugin: Arc<dyn Plugin> = Arc::new(RecordingPlugin::new(
                    &plugin_name,
                    Arc::clone(&log),
                    trampoline,
                    reply,
                ));
                plugin
            })),
            close_ok: true,
            broken_factory: false,
        }
    }

    /// A library without the plugin signature symbols.
    pub(crate) fn not_a_plugin() -> Self {
        Self {
            name: None,
            metadata: None,
            constructor: None,
            close_ok: true,
            broken_factory: false,
        }
    }

    /// Makes the library refuse to release its handle.
    pub(crate) fn with_close_failure(mut self) -> Self {
        self.close_ok = false;
        self
    }

    /// Makes the factory fail at instantiation time.
    pub(crate) fn with_broken_factory(mut self) -> Self {
        self.broken_factory = true;
        self
    }
}

/// In-process [`PluginLibrary`] double.
pub(crate) struct FakeLibrary {
    path: PathBuf,
    spec: FakeLibrarySpec,
    open: bool,
}

impl std::fmt::Debug for FakeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeLibrary")
            .field("path", &self.path)
            .field("open", &self.open)
            .finish()
    }
}

impl FakeLibrary {
    pub(crate) fn new(path: PathBuf, spec: FakeLibrarySpec) -> Self {
        Self {
            path,
            spec,
            open: true,
        }
    }
}

impl PluginLibrary for FakeLibrary {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_plugin(&self) -> bool {
        self.spec.name.is_some() && self.spec.metadata.is_some() && self.spec.constructor.is_some()
    }

    fn plugin_name(&self) -> Result<String, PluginError> {
        self.spec
            .name
            .clone()
            .ok_or_else(|| PluginError::SymbolNotFound {
                path: self.path.clone(),
                symbol: String::from("jp_name"),
            })
    }

    fn metadata(&self) -> Result<String, PluginError> {
        self.spec
            .metadata
            .clone()
            .ok_or_else(|| PluginError::SymbolNotFound {
                path: self.path.clone(),
                symbol: String::from("jp_metadata"),
            })
    }

    fn instantiate(&self, trampoline: RequestTrampoline) -> Result<Arc<dyn Plugin>, PluginError> {
        if self.spec.broken_factory {
            return Err(PluginError::ConstructFailed {
                path: self.path.clone(),
            });
        }
        let constructor =
            self.spec
                .constructor
                .as_ref()
                .ok_or_else(|| PluginError::SymbolNotFound {
                    path: self.path.clone(),
                    symbol: String::from("jp_createPlugin"),
                })?;
        Ok(constructor(trampoline))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> bool {
        if !self.open {
            return true;
        }
        if self.spec.close_ok {
            self.open = false;
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// FakeLoader
// ---------------------------------------------------------------------------

/// In-process [`LibraryLoader`] double fed from blueprints.
#[derive(Default)]
pub(crate) struct FakeLoader {
    entries: Vec<(PathBuf, FakeLibrarySpec)>,
    unopenable: Vec<PathBuf>,
    unlistable: Vec<PathBuf>,
}

impl FakeLoader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a library at `path` built from `spec`.
    pub(crate) fn with_library(mut self, path: &str, spec: FakeLibrarySpec) -> Self {
        self.entries.push((PathBuf::from(path), spec));
        self
    }

    /// Adds a candidate that enumerates but refuses to open.
    pub(crate) fn with_unopenable(mut self, path: &str) -> Self {
        self.unopenable.push(PathBuf::from(path));
        self
    }

    /// Makes enumeration of `dir` report a scan failure.
    pub(crate) fn with_unlistable_dir(mut self, dir: &str) -> Self {
        self.unlistable.push(PathBuf::from(dir));
        self
    }
}

fn in_dir(path: &Path, dir: &Path, recursive: bool) -> bool {
    if recursive {
        path.starts_with(dir)
    } else {
        path.parent() == Some(dir)
    }
}

impl LibraryLoader for FakeLoader {
    fn enumerate(&self, dir: &Path, recursive: bool) -> Enumeration {
        let mut listing = Enumeration::default();
        if self.unlistable.iter().any(|d| d == dir) {
            listing.errors.push(PluginError::ListDir {
                path: dir.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            });
        }
        for (path, _) in &self.entries {
            if in_dir(path, dir, recursive) {
                listing.libraries.push(path.clone());
            }
        }
        for path in &self.unopenable {
            if in_dir(path, dir, recursive) {
                listing.libraries.push(path.clone());
            }
        }
        listing.libraries.sort();
        listing
    }

    fn open(&self, path: &Path) -> Result<Box<dyn PluginLibrary>, PluginError> {
        self.entries
            .iter()
            .find(|(entry_path, _)| entry_path == path)
            .map(|(entry_path, spec)| {
                Box::new(FakeLibrary::new(entry_path.clone(), spec.clone()))
                    as Box<dyn PluginLibrary>
            })
            .ok_or_else(|| PluginError::Open {
                path: path.to_path_buf(),
                message: String::from("not a loadable object"),
            })
    }
}

// ---------------------------------------------------------------------------
// Record helpers
// ---------------------------------------------------------------------------

/// Builds a registrable record for a fake plugin.
pub(crate) fn make_record(
    name: &str,
    version: &str,
    deps: &[(&str, &str)],
    log: &SharedLog,
) -> PluginRecord {
    let metadata = manifest_json(name, version, deps);
    let info = parse_info(&metadata);
    let path = PathBuf::from(format!("/plugins/lib{name}.so"));
    let spec = FakeLibrarySpec::plugin(name, &metadata, log);
    PluginRecord::new(info, path.clone(), Box::new(FakeLibrary::new(path, spec)))
}
