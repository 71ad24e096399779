//! Directory search: candidate qualification and registration.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::ReturnCode;
use crate::library::LibraryLoader;
use crate::manifest::{self, PLUGIN_API};
use crate::registry::{PluginRecord, PluginRegistry};

const DISCOVERY_TARGET: &str = "jackplug::discovery";

/// Walks `dir` for shared libraries and registers every qualifying plugin.
///
/// A candidate qualifies when it exports the three `jp_*` signature symbols;
/// anything else is closed and ignored silently. Qualifying candidates are
/// rejected (with an event) on duplicate names or unparseable manifests.
/// The directory is remembered as a location only when at least one plugin
/// was registered by this call.
pub(crate) fn search(
    registry: &mut PluginRegistry,
    loader: &dyn LibraryLoader,
    dir: &Path,
    recursive: bool,
    on_event: &mut dyn FnMut(ReturnCode, Option<String>),
) -> ReturnCode {
    let listing = loader.enumerate(dir, recursive);
    for error in &listing.errors {
        warn!(target: DISCOVERY_TARGET, error = %error, "directory scan failed");
        on_event(ReturnCode::SearchListFilesError, Some(error.to_string()));
    }
    if listing.libraries.is_empty() && !listing.errors.is_empty() {
        return ReturnCode::SearchListFilesError;
    }

    let mut registered_any = false;
    for path in listing.libraries {
        let library = match loader.open(&path) {
            Ok(library) => library,
            Err(error) => {
                debug!(target: DISCOVERY_TARGET, error = %error, "skipping unloadable candidate");
                continue;
            }
        };
        if !library.is_plugin() {
            continue;
        }
        debug!(target: DISCOVERY_TARGET, path = %path.display(), "found plugin library");

        let name = match library.plugin_name() {
            Ok(name) => name,
            Err(error) => {
                debug!(target: DISCOVERY_TARGET, error = %error, "skipping unreadable name symbol");
                continue;
            }
        };
        if registry.contains(&name) {
            on_event(
                ReturnCode::SearchNameAlreadyExists,
                Some(path.display().to_string()),
            );
            continue;
        }

        let metadata = match library.metadata() {
            Ok(metadata) => metadata,
            Err(error) => {
                debug!(target: DISCOVERY_TARGET, error = %error, "metadata symbol unreadable");
                on_event(
                    ReturnCode::SearchCannotParseMetadata,
                    Some(path.display().to_string()),
                );
                continue;
            }
        };
        let info = match manifest::parse(&metadata, PLUGIN_API) {
            Ok(info) => info,
            Err(error) => {
                debug!(target: DISCOVERY_TARGET, plugin = %name, error = %error, "manifest rejected");
                on_event(
                    ReturnCode::SearchCannotParseMetadata,
                    Some(path.display().to_string()),
                );
                continue;
            }
        };

        debug!(target: DISCOVERY_TARGET, plugin = %name, path = %path.display(), "registered plugin");
        registry.insert(name, PluginRecord::new(info, path, library));
        registered_any = true;
    }

    if registered_any {
        registry.add_location(dir);
        ReturnCode::Success
    } else {
        ReturnCode::SearchNothingFound
    }
}
