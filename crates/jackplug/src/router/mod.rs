//! Inter-plugin request routing.
//!
//! Plugins cannot hold references into the manager across the C ABI, so all
//! requests funnel through [`request_trampoline`], a fixed-signature
//! function injected into every plugin factory. The trampoline resolves the
//! process-global manager, translates the C strings, and dispatches through
//! [`route`]. Dispatch happens with the registry lock released; the target
//! instance is cloned out under the lock first.

use std::ffi::{c_char, c_void, CStr};

use tracing::debug;

use crate::manager::PluginManager;

const ROUTER_TARGET: &str = "jackplug::router";

/// Routes a request to `receiver`, or to the manager when `receiver` is
/// `None`.
///
/// Manager-addressed requests are reserved for future host-level codes and
/// currently answer `0`. A receiver that is unknown, whose library is no
/// longer open, or which has no instance also answers `0`. Otherwise the
/// receiver's response is returned verbatim.
pub(crate) fn route(
    manager: &PluginManager,
    sender: &str,
    receiver: Option<&str>,
    code: u16,
    data: *mut c_void,
    data_size: *mut u32,
) -> u16 {
    debug!(target: ROUTER_TARGET, sender, receiver, code, "routing request");
    let Some(receiver) = receiver else {
        // Addressed to the manager itself; no host-level codes yet.
        return 0;
    };
    let target = {
        let registry = manager.lock_registry();
        registry
            .record(receiver)
            .filter(|record| record.is_open())
            .and_then(|record| record.instance().cloned())
    };
    match target {
        Some(instance) => instance.handle_request(sender, code, data, data_size),
        None => 0,
    }
}

/// Process-global request entry point handed to every plugin factory.
///
/// A null `receiver` addresses the manager. A `receiver` that is not valid
/// UTF-8 cannot name any registered plugin and answers `0`.
pub(crate) unsafe extern "C" fn request_trampoline(
    sender: *const c_char,
    receiver: *const c_char,
    code: u16,
    data: *mut c_void,
    data_size: *mut u32,
) -> u16 {
    let sender = if sender.is_null() {
        ""
    } else {
        CStr::from_ptr(sender).to_str().unwrap_or("")
    };
    let receiver = if receiver.is_null() {
        None
    } else {
        match CStr::from_ptr(receiver).to_str() {
            Ok(name) => Some(name),
            Err(_) => return 0,
        }
    };
    route(
        PluginManager::instance(),
        sender,
        receiver,
        code,
        data,
        data_size,
    )
}
