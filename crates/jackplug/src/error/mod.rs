//! Outcome codes and domain errors for plugin operations.
//!
//! Public bulk operations (`search`, `load`, `unload`) summarise their result
//! as a [`ReturnCode`]; per-item failures inside those operations are
//! reported through the event callback with the same codes. Failures of the
//! external collaborators (dynamic loader, filesystem, JSON parser) are
//! `thiserror`-derived [`PluginError`] values, trapped and converted to a
//! `ReturnCode` before they reach a public boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Summary outcome of a manager operation.
///
/// `Success` is reserved for "the operation achieved its intent"; every
/// other variant describes why it did not.
///
/// # Example
///
/// ```
/// use jackplug::ReturnCode;
///
/// let code = ReturnCode::SearchNothingFound;
/// assert!(!code.is_success());
/// assert_eq!(code.message(), "No plugins was found in that directory");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    /// The operation achieved its intent.
    Success,
    /// An unclassified failure.
    UnknownError,
    /// The searched directory contained no registrable plugin.
    SearchNothingFound,
    /// A candidate library carried a manifest that could not be parsed.
    SearchCannotParseMetadata,
    /// A candidate library declared a name that is already registered.
    SearchNameAlreadyExists,
    /// The directory scan itself failed.
    SearchListFilesError,
    /// A declared dependency is registered in an incompatible version.
    LoadDependencyBadVersion,
    /// A declared dependency is not registered at all.
    LoadDependencyNotFound,
    /// The dependency graph contains a cycle.
    LoadDependencyCycle,
    /// At least one library handle could not be released during unload.
    UnloadNotAll,
}

impl ReturnCode {
    /// Returns the fixed human-readable message for this code.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::UnknownError => "Unknown error",
            Self::SearchNothingFound => "No plugins was found in that directory",
            Self::SearchCannotParseMetadata => {
                "Plugins metadata cannot be parsed (maybe they are invalid ?)"
            }
            Self::SearchNameAlreadyExists => "A plugin with the same name was already found",
            Self::SearchListFilesError => "An error occurs during the scan of the plugin dir",
            Self::LoadDependencyBadVersion => {
                "The plugin requires a dependency that's in an incorrect version"
            }
            Self::LoadDependencyNotFound => "The plugin requires a dependency that wasn't found",
            Self::LoadDependencyCycle => {
                "The dependencies graph contains a cycle, which makes impossible to load plugins"
            }
            Self::UnloadNotAll => "Not all plugins have been unloaded",
        }
    }

    /// Returns `true` for [`ReturnCode::Success`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl From<ReturnCode> for bool {
    fn from(code: ReturnCode) -> Self {
        code.is_success()
    }
}

impl From<bool> for ReturnCode {
    fn from(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::UnknownError
        }
    }
}

/// Errors raised by the external collaborators behind the loader seam.
///
/// These never cross a public manager boundary; they are converted to the
/// appropriate [`ReturnCode`] (and an event detail string) at the call site.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The shared object could not be opened.
    #[error("cannot open library `{}`: {message}", .path.display())]
    Open {
        /// Path of the candidate library.
        path: PathBuf,
        /// Loader failure description.
        message: String,
    },

    /// A required exported symbol is absent.
    #[error("library `{}` does not export symbol `{symbol}`", .path.display())]
    SymbolNotFound {
        /// Path of the library.
        path: PathBuf,
        /// Name of the missing symbol.
        symbol: String,
    },

    /// An exported string symbol is not valid UTF-8.
    #[error("symbol `{symbol}` in `{}` is not valid UTF-8", .path.display())]
    InvalidSymbol {
        /// Path of the library.
        path: PathBuf,
        /// Name of the offending symbol.
        symbol: String,
    },

    /// A directory could not be scanned for candidates.
    #[error("cannot list plugin candidates under `{}`: {source}", .path.display())]
    ListDir {
        /// Directory that failed to enumerate.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The embedded manifest is malformed.
    #[error("cannot parse plugin metadata: {message}")]
    Metadata {
        /// Description of the parse failure.
        message: String,
        /// Optional underlying JSON error.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The manifest declares an API version the host does not support.
    #[error("plugin declares API `{declared}` incompatible with host API `{expected}`")]
    IncompatibleApi {
        /// API version declared by the plugin.
        declared: String,
        /// API version compiled into the host.
        expected: String,
    },

    /// The exported factory produced no plugin instance.
    #[error("constructor of `{}` returned no plugin instance", .path.display())]
    ConstructFailed {
        /// Path of the library.
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests;
