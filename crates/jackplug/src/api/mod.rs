//! The contract between the host and plugin binaries.
//!
//! A shared library qualifies as a plugin when it exports three symbols with
//! C linkage:
//!
//! - `jp_name` — a nul-terminated byte array holding the plugin's unique
//!   registration name;
//! - `jp_metadata` — a nul-terminated byte array holding the UTF-8 JSON
//!   manifest (see [`crate::manifest`]);
//! - `jp_createPlugin` — a factory with the [`PluginConstructor`] signature
//!   that receives the manager's request trampoline and returns a
//!   [`PluginHandle`]: an opaque state pointer plus a `#[repr(C)]` vtable of
//!   entry points, ownership transferred to the host.
//!
//! Rust trait objects have no stable layout, so none cross the boundary:
//! the handle carries only C-compatible members, and each side keeps its own
//! trait machinery. Plugin crates built as `cdylib` declare all three
//! symbols with the [`declare_plugin!`](crate::declare_plugin) macro, which
//! fills the vtable for the concrete plugin type. The trampoline injected
//! into the factory is the only channel back into the manager; plugins wrap
//! it in a [`RequestSender`] to address peers by name.

use std::any::Any;
use std::ffi::{c_char, c_void, CStr, CString};
use std::sync::Arc;

/// Exported symbol holding the plugin name.
pub const NAME_SYMBOL: &[u8] = b"jp_name\0";
/// Exported symbol holding the JSON manifest.
pub const METADATA_SYMBOL: &[u8] = b"jp_metadata\0";
/// Exported symbol holding the plugin factory.
pub const CREATE_SYMBOL: &[u8] = b"jp_createPlugin\0";

/// Fixed-signature request entry point shared by the manager and every
/// plugin.
///
/// `sender` is the name of the requesting plugin; `receiver` is the name of
/// the addressed plugin, or null to address the manager itself. `data` and
/// `data_size` stay owned by the sender and must remain valid until the
/// call returns.
pub type RequestTrampoline = unsafe extern "C" fn(
    sender: *const c_char,
    receiver: *const c_char,
    code: u16,
    data: *mut c_void,
    data_size: *mut u32,
) -> u16;

/// Signature of the `jp_createPlugin` factory exported by plugin binaries.
///
/// The handle is returned by value; ownership of its state pointer
/// transfers to the host, which releases it through the vtable's
/// `destroy` entry.
pub type PluginConstructor = unsafe extern "C" fn(RequestTrampoline) -> PluginHandle;

/// C-ABI view of one plugin instance.
///
/// `state` points at the boxed plugin value; `vtable` holds the entry
/// points operating on it. Built by [`PluginHandle::new`] on the plugin
/// side and consumed by the host, which must call
/// [`PluginVTable::destroy`] exactly once when done.
#[repr(C)]
pub struct PluginHandle {
    /// Opaque pointer to the plugin value.
    pub state: *mut c_void,
    /// Entry points operating on `state`.
    pub vtable: PluginVTable,
}

impl PluginHandle {
    /// Boxes `plugin` behind the C ABI.
    #[must_use]
    pub fn new<P: Plugin>(plugin: P) -> Self {
        Self {
            state: Box::into_raw(Box::new(plugin)).cast(),
            vtable: PluginVTable::new::<P>(),
        }
    }
}

/// Table of C-ABI entry points for one concrete plugin type.
///
/// Every member is a plain `extern "C"` function pointer taking the opaque
/// state pointer, so the table's layout is defined by the C ABI alone.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PluginVTable {
    /// Invoked once after construction, in dependency order.
    pub loaded: unsafe extern "C" fn(state: *mut c_void),
    /// Invoked once immediately before destruction.
    pub about_to_be_unloaded: unsafe extern "C" fn(state: *mut c_void),
    /// Delivers a request from `sender` and returns the plugin's response.
    pub handle_request: unsafe extern "C" fn(
        state: *mut c_void,
        sender: *const c_char,
        code: u16,
        data: *mut c_void,
        data_size: *mut u32,
    ) -> u16,
    /// Destroys the plugin value and releases `state`.
    pub destroy: unsafe extern "C" fn(state: *mut c_void),
}

impl PluginVTable {
    /// Builds the table for one concrete plugin type.
    #[must_use]
    pub fn new<P: Plugin>() -> Self {
        Self {
            loaded: ffi_loaded::<P>,
            about_to_be_unloaded: ffi_about_to_be_unloaded::<P>,
            handle_request: ffi_handle_request::<P>,
            destroy: ffi_destroy::<P>,
        }
    }
}

unsafe extern "C" fn ffi_loaded<P: Plugin>(state: *mut c_void) {
    (*state.cast::<P>()).loaded();
}

unsafe extern "C" fn ffi_about_to_be_unloaded<P: Plugin>(state: *mut c_void) {
    (*state.cast::<P>()).about_to_be_unloaded();
}

unsafe extern "C" fn ffi_handle_request<P: Plugin>(
    state: *mut c_void,
    sender: *const c_char,
    code: u16,
    data: *mut c_void,
    data_size: *mut u32,
) -> u16 {
    let sender = if sender.is_null() {
        ""
    } else {
        CStr::from_ptr(sender).to_str().unwrap_or("")
    };
    (*state.cast::<P>()).handle_request(sender, code, data, data_size)
}

unsafe extern "C" fn ffi_destroy<P: Plugin>(state: *mut c_void) {
    drop(Box::from_raw(state.cast::<P>()));
}

/// A loaded plugin instance.
///
/// The manager invokes [`loaded`](Plugin::loaded) once after construction in
/// dependency order, routes peer requests to
/// [`handle_request`](Plugin::handle_request), and invokes
/// [`about_to_be_unloaded`](Plugin::about_to_be_unloaded) once before the
/// instance is destroyed and its library closed.
pub trait Plugin: Any + Send + Sync {
    /// Called once after construction. Every dependency of this plugin has
    /// already been loaded and is still loaded.
    fn loaded(&self) {}

    /// Called once immediately before the instance is destroyed.
    fn about_to_be_unloaded(&self) {}

    /// Handles a request routed from `sender`.
    ///
    /// `data` and `data_size` belong to the sender and are only valid for
    /// the duration of the call.
    fn handle_request(
        &self,
        sender: &str,
        code: u16,
        data: *mut c_void,
        data_size: *mut u32,
    ) -> u16 {
        let _ = (sender, code, data, data_size);
        0
    }

    /// Capability query used for typed downcasts by the host.
    ///
    /// Implementations return `self`.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Plugin-side handle for issuing requests through the injected trampoline.
///
/// Constructed from the factory argument; cheap to clone.
#[derive(Debug, Clone)]
pub struct RequestSender {
    name: CString,
    trampoline: RequestTrampoline,
}

impl RequestSender {
    /// Creates a sender that identifies itself as `name`.
    #[must_use]
    pub fn new(name: &str, trampoline: RequestTrampoline) -> Self {
        Self {
            name: to_c_string(name),
            trampoline,
        }
    }

    /// Returns the name this sender identifies itself with.
    #[must_use]
    pub fn plugin_name(&self) -> &str {
        self.name.to_str().unwrap_or_default()
    }

    /// Sends a request to `receiver`, or to the manager when `receiver` is
    /// `None`, and returns the receiver's response code.
    ///
    /// `data` and `data_size` remain owned by the caller and must stay valid
    /// until the call returns.
    pub fn send_request(
        &self,
        receiver: Option<&str>,
        code: u16,
        data: *mut c_void,
        data_size: *mut u32,
    ) -> u16 {
        let receiver = receiver.map(to_c_string);
        let receiver_ptr = receiver
            .as_ref()
            .map_or(std::ptr::null(), |name| name.as_ptr());
        unsafe { (self.trampoline)(self.name.as_ptr(), receiver_ptr, code, data, data_size) }
    }
}

/// Builds a C string, stripping interior nul bytes.
pub(crate) fn to_c_string(text: &str) -> CString {
    let bytes: Vec<u8> = text.bytes().filter(|&b| b != 0).collect();
    CString::new(bytes).unwrap_or_default()
}

/// Copies a nul-terminated string literal into a fixed byte array.
///
/// Exists for [`declare_plugin!`](crate::declare_plugin); not part of the
/// public API surface.
#[doc(hidden)]
#[must_use]
pub const fn c_literal<const N: usize>(value: &str) -> [u8; N] {
    let bytes = value.as_bytes();
    assert!(bytes.len() + 1 == N, "array must fit value plus nul");
    let mut out = [0u8; N];
    let mut i = 0;
    while i < bytes.len() {
        out[i] = bytes[i];
        i += 1;
    }
    out
}

/// Exports the three plugin signature symbols from a `cdylib` plugin crate.
///
/// Takes the registration name, the JSON manifest, and a constructor
/// function mapping the injected [`RequestTrampoline`] to the plugin value.
///
/// # Example
///
/// ```
/// use std::any::Any;
/// use std::sync::Arc;
/// use jackplug::{declare_plugin, Plugin, RequestSender, RequestTrampoline};
///
/// struct Greeter {
///     requests: RequestSender,
/// }
///
/// impl Greeter {
///     fn new(trampoline: RequestTrampoline) -> Self {
///         Self {
///             requests: RequestSender::new("greeter", trampoline),
///         }
///     }
/// }
///
/// impl Plugin for Greeter {
///     fn loaded(&self) {
///         self.requests
///             .send_request(None, 1, std::ptr::null_mut(), std::ptr::null_mut());
///     }
///
///     fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
///         self
///     }
/// }
///
/// declare_plugin!(
///     "greeter",
///     r#"{
///         "api": "1.0.0",
///         "name": "greeter",
///         "prettyName": "Greeter",
///         "version": "0.1.0",
///         "author": "someone",
///         "url": "https://example.org",
///         "license": "MIT",
///         "copyright": "someone",
///         "dependencies": []
///     }"#,
///     Greeter::new
/// );
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($name:expr, $metadata:expr, $constructor:expr) => {
        #[allow(non_upper_case_globals)]
        #[no_mangle]
        pub static jp_name: [u8; $name.len() + 1] = $crate::api::c_literal($name);

        #[allow(non_upper_case_globals)]
        #[no_mangle]
        pub static jp_metadata: [u8; $metadata.len() + 1] = $crate::api::c_literal($metadata);

        #[allow(non_snake_case)]
        #[no_mangle]
        pub unsafe extern "C" fn jp_createPlugin(
            trampoline: $crate::api::RequestTrampoline,
        ) -> $crate::api::PluginHandle {
            let constructor: fn($crate::api::RequestTrampoline) -> _ = $constructor;
            $crate::api::PluginHandle::new(constructor(trampoline))
        }
    };
}
