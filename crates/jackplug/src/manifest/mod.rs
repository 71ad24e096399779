//! Plugin manifest parsing and the immutable metadata snapshot.
//!
//! Every plugin library embeds a JSON manifest behind its `jp_metadata`
//! symbol. Parsing validates the document shape, checks the declared `api`
//! version against the host's [`PLUGIN_API`], and produces a [`PluginInfo`]
//! snapshot that is immutable from then on. A manifest that fails any of
//! these checks is rejected as a whole; the candidate library is treated as
//! unparseable by the caller.

use serde::{Deserialize, Serialize};

use crate::error::PluginError;
use crate::version;

/// Plugin API version compiled into this host.
///
/// A manifest whose `api` field is not compatible with this version is
/// rejected during parsing.
pub const PLUGIN_API: &str = "1.0.0";

/// A single dependency declaration: a plugin name and the minimum version
/// the declaring plugin requires of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDependency {
    name: String,
    #[serde(rename = "version")]
    min_version: String,
}

impl PluginDependency {
    /// Returns the name of the required plugin.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the minimum acceptable version of the required plugin.
    #[must_use]
    pub fn min_version(&self) -> &str {
        self.min_version.as_str()
    }
}

/// Immutable plugin metadata extracted from a manifest.
///
/// The snapshot owns all of its strings; values handed to hosts are clones
/// that remain valid independently of the registry.
///
/// # Example
///
/// ```
/// use jackplug::manifest::{parse, PLUGIN_API};
///
/// let manifest = r#"{
///     "api": "1.0.0",
///     "name": "alpha",
///     "prettyName": "Alpha",
///     "version": "0.3.0",
///     "author": "Ada",
///     "url": "https://example.org/alpha",
///     "license": "MIT",
///     "copyright": "Ada",
///     "dependencies": [{"name": "base", "version": "1.0"}]
/// }"#;
///
/// let info = parse(manifest, PLUGIN_API).expect("manifest parses");
/// assert_eq!(info.name(), "alpha");
/// assert_eq!(info.dependencies()[0].name(), "base");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    name: String,
    pretty_name: String,
    version: String,
    author: String,
    url: String,
    license: String,
    copyright: String,
    dependencies: Vec<PluginDependency>,
}

impl PluginInfo {
    /// Returns the unique plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the display name.
    #[must_use]
    pub fn pretty_name(&self) -> &str {
        self.pretty_name.as_str()
    }

    /// Returns the plugin version.
    #[must_use]
    pub fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Returns the author string.
    #[must_use]
    pub fn author(&self) -> &str {
        self.author.as_str()
    }

    /// Returns the project URL.
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns the license identifier.
    #[must_use]
    pub fn license(&self) -> &str {
        self.license.as_str()
    }

    /// Returns the copyright string.
    #[must_use]
    pub fn copyright(&self) -> &str {
        self.copyright.as_str()
    }

    /// Returns the declared dependencies in manifest order.
    #[must_use]
    pub fn dependencies(&self) -> &[PluginDependency] {
        &self.dependencies
    }
}

impl std::fmt::Display for PluginInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Plugin info:")?;
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Pretty name: {}", self.pretty_name)?;
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "Author: {}", self.author)?;
        writeln!(f, "Url: {}", self.url)?;
        writeln!(f, "License: {}", self.license)?;
        writeln!(f, "Copyright: {}", self.copyright)?;
        writeln!(f, "Dependencies:")?;
        for dep in &self.dependencies {
            writeln!(f, " - {} ({})", dep.name, dep.min_version)?;
        }
        Ok(())
    }
}

/// Raw manifest document. The `api` field is consumed by the compatibility
/// check and never stored on the snapshot.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestDoc {
    api: String,
    name: String,
    pretty_name: String,
    version: String,
    author: String,
    url: String,
    license: String,
    copyright: String,
    dependencies: Vec<PluginDependency>,
}

/// Parses a manifest and validates it against the host API version.
///
/// # Errors
///
/// Returns [`PluginError::Metadata`] when the document is malformed, a
/// required field is missing or mistyped, or the name is empty. Returns
/// [`PluginError::IncompatibleApi`] when the declared `api` version is not
/// compatible with `host_api`.
pub fn parse(metadata: &str, host_api: &str) -> Result<PluginInfo, PluginError> {
    let doc: ManifestDoc = serde_json::from_str(metadata).map_err(|source| {
        PluginError::Metadata {
            message: source.to_string(),
            source: Some(source),
        }
    })?;

    if !version::compatible(&doc.api, host_api) {
        return Err(PluginError::IncompatibleApi {
            declared: doc.api,
            expected: host_api.to_owned(),
        });
    }

    if doc.name.is_empty() {
        return Err(PluginError::Metadata {
            message: String::from("plugin name must not be empty"),
            source: None,
        });
    }

    Ok(PluginInfo {
        name: doc.name,
        pretty_name: doc.pretty_name,
        version: doc.version,
        author: doc.author,
        url: doc.url,
        license: doc.license,
        copyright: doc.copyright,
        dependencies: doc.dependencies,
    })
}
