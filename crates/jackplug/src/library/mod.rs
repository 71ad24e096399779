//! Dynamic-library access behind a narrow seam.
//!
//! The manager consumes the native loader through the [`LibraryLoader`] and
//! [`PluginLibrary`] traits so that everything above this module can be
//! exercised with in-process doubles. The production implementation,
//! [`DiskLoader`], enumerates shared objects by the platform library suffix
//! and opens them with `libloading`. All `unsafe` in the crate lives here.

use std::any::Any;
use std::ffi::{c_char, c_void, CStr, OsStr};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};
use tracing::{debug, warn};

use crate::api::{
    to_c_string, Plugin, PluginConstructor, PluginVTable, RequestTrampoline, CREATE_SYMBOL,
    METADATA_SYMBOL, NAME_SYMBOL,
};
use crate::error::PluginError;

/// Tracing target for library operations.
const LIBRARY_TARGET: &str = "jackplug::library";

/// An opened shared object that may hold a plugin.
///
/// The handle owns the underlying library and, for real libraries, the
/// factory symbol resolved from it; both stay valid exactly as long as the
/// handle is open. Dropping an open handle releases the library.
pub trait PluginLibrary: Send + std::fmt::Debug {
    /// Returns the path the library was opened from.
    fn path(&self) -> &Path;

    /// Returns `true` when all three plugin signature symbols are exported.
    fn is_plugin(&self) -> bool;

    /// Reads the plugin name from the `jp_name` symbol.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::SymbolNotFound`] when the symbol is absent and
    /// [`PluginError::InvalidSymbol`] when it is not valid UTF-8.
    fn plugin_name(&self) -> Result<String, PluginError>;

    /// Reads the JSON manifest from the `jp_metadata` symbol.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`PluginLibrary::plugin_name`].
    fn metadata(&self) -> Result<String, PluginError>;

    /// Resolves the factory and constructs the plugin instance, handing it
    /// the request trampoline.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::SymbolNotFound`] when the factory symbol is
    /// absent and [`PluginError::ConstructFailed`] when it returns a null
    /// state pointer.
    fn instantiate(&self, trampoline: RequestTrampoline) -> Result<Arc<dyn Plugin>, PluginError>;

    /// Returns `true` while the underlying handle is open.
    fn is_open(&self) -> bool;

    /// Closes the underlying handle. Returns `true` when the handle is
    /// released (or was already closed).
    fn close(&mut self) -> bool;
}

/// Result of scanning a directory for candidate shared objects.
///
/// Enumeration is best-effort: unreadable directories are recorded as
/// errors while the scan continues elsewhere, so a partial listing and
/// errors can coexist.
#[derive(Debug, Default)]
pub struct Enumeration {
    /// Candidate library paths, sorted for a deterministic discovery order.
    pub libraries: Vec<PathBuf>,
    /// Failures encountered while scanning.
    pub errors: Vec<PluginError>,
}

/// Provider of candidate libraries for discovery.
pub trait LibraryLoader: Send + Sync {
    /// Lists candidate shared objects under `dir`, descending into
    /// subdirectories when `recursive` is set.
    fn enumerate(&self, dir: &Path, recursive: bool) -> Enumeration;

    /// Opens the library at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Open`] when the object cannot be loaded.
    fn open(&self, path: &Path) -> Result<Box<dyn PluginLibrary>, PluginError>;
}

/// Production loader backed by the platform dynamic linker.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskLoader;

impl DiskLoader {
    fn scan(dir: &Path, recursive: bool, listing: &mut Enumeration) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(source) => {
                listing.errors.push(PluginError::ListDir {
                    path: dir.to_path_buf(),
                    source,
                });
                return;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    listing.errors.push(PluginError::ListDir {
                        path: dir.to_path_buf(),
                        source,
                    });
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                if recursive {
                    Self::scan(&path, recursive, listing);
                }
                continue;
            }
            let is_library = path
                .file_name()
                .and_then(OsStr::to_str)
                .is_some_and(|name| name.ends_with(std::env::consts::DLL_SUFFIX));
            if is_library {
                listing.libraries.push(path);
            }
        }
    }
}

impl LibraryLoader for DiskLoader {
    fn enumerate(&self, dir: &Path, recursive: bool) -> Enumeration {
        debug!(
            target: LIBRARY_TARGET,
            dir = %dir.display(),
            recursive,
            "scanning for candidate libraries"
        );
        let mut listing = Enumeration::default();
        Self::scan(dir, recursive, &mut listing);
        listing.libraries.sort();
        listing
    }

    fn open(&self, path: &Path) -> Result<Box<dyn PluginLibrary>, PluginError> {
        let library = unsafe { Library::new(path) }.map_err(|err| PluginError::Open {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(Box::new(DiskLibrary {
            path: path.to_path_buf(),
            library: Some(library),
        }))
    }
}

/// A shared object opened through `libloading`.
///
/// The `jp_name` and `jp_metadata` symbols are read as nul-terminated byte
/// arrays whose address is the start of the string, the layout produced by
/// `declare_plugin!`.
#[derive(Debug)]
struct DiskLibrary {
    path: PathBuf,
    library: Option<Library>,
}

impl DiskLibrary {
    fn symbol_label(symbol: &[u8]) -> String {
        String::from_utf8_lossy(&symbol[..symbol.len().saturating_sub(1)]).into_owned()
    }

    fn has_symbol(&self, symbol: &[u8]) -> bool {
        self.library
            .as_ref()
            .is_some_and(|library| unsafe { library.get::<*mut ()>(symbol) }.is_ok())
    }

    fn read_string(&self, symbol: &'static [u8]) -> Result<String, PluginError> {
        let library = self.library.as_ref().ok_or_else(|| PluginError::SymbolNotFound {
            path: self.path.clone(),
            symbol: Self::symbol_label(symbol),
        })?;
        unsafe {
            let sym: Symbol<'_, c_char> =
                library.get(symbol).map_err(|_| PluginError::SymbolNotFound {
                    path: self.path.clone(),
                    symbol: Self::symbol_label(symbol),
                })?;
            CStr::from_ptr(&*sym as *const c_char)
                .to_str()
                .map(str::to_owned)
                .map_err(|_| PluginError::InvalidSymbol {
                    path: self.path.clone(),
                    symbol: Self::symbol_label(symbol),
                })
        }
    }
}

impl PluginLibrary for DiskLibrary {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_plugin(&self) -> bool {
        self.has_symbol(NAME_SYMBOL)
            && self.has_symbol(METADATA_SYMBOL)
            && self.has_symbol(CREATE_SYMBOL)
    }

    fn plugin_name(&self) -> Result<String, PluginError> {
        self.read_string(NAME_SYMBOL)
    }

    fn metadata(&self) -> Result<String, PluginError> {
        self.read_string(METADATA_SYMBOL)
    }

    fn instantiate(&self, trampoline: RequestTrampoline) -> Result<Arc<dyn Plugin>, PluginError> {
        let library = self.library.as_ref().ok_or_else(|| PluginError::SymbolNotFound {
            path: self.path.clone(),
            symbol: Self::symbol_label(CREATE_SYMBOL),
        })?;
        unsafe {
            let constructor: Symbol<'_, PluginConstructor> =
                library
                    .get(CREATE_SYMBOL)
                    .map_err(|_| PluginError::SymbolNotFound {
                        path: self.path.clone(),
                        symbol: Self::symbol_label(CREATE_SYMBOL),
                    })?;
            let handle = constructor(trampoline);
            if handle.state.is_null() {
                return Err(PluginError::ConstructFailed {
                    path: self.path.clone(),
                });
            }
            Ok(Arc::new(ForeignPlugin {
                state: handle.state,
                vtable: handle.vtable,
            }))
        }
    }

    fn is_open(&self) -> bool {
        self.library.is_some()
    }

    fn close(&mut self) -> bool {
        match self.library.take() {
            Some(library) => match library.close() {
                Ok(()) => true,
                Err(err) => {
                    warn!(
                        target: LIBRARY_TARGET,
                        path = %self.path.display(),
                        error = %err,
                        "failed to release library handle"
                    );
                    false
                }
            },
            None => true,
        }
    }
}

/// Host-side adapter over a plugin constructed across the C ABI.
///
/// Owns the opaque state pointer returned by `jp_createPlugin`; trait calls
/// are forwarded through the vtable and the state is released through its
/// `destroy` entry when the adapter is dropped.
struct ForeignPlugin {
    state: *mut c_void,
    vtable: PluginVTable,
}

// The state pointer is owned exclusively by this adapter, and the plugin
// contract requires the vtable entries to be callable from any thread.
unsafe impl Send for ForeignPlugin {}
unsafe impl Sync for ForeignPlugin {}

impl Plugin for ForeignPlugin {
    fn loaded(&self) {
        unsafe { (self.vtable.loaded)(self.state) }
    }

    fn about_to_be_unloaded(&self) {
        unsafe { (self.vtable.about_to_be_unloaded)(self.state) }
    }

    fn handle_request(
        &self,
        sender: &str,
        code: u16,
        data: *mut c_void,
        data_size: *mut u32,
    ) -> u16 {
        let sender = to_c_string(sender);
        unsafe { (self.vtable.handle_request)(self.state, sender.as_ptr(), code, data, data_size) }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Drop for ForeignPlugin {
    fn drop(&mut self) {
        unsafe { (self.vtable.destroy)(self.state) }
    }
}
