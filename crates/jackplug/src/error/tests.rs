//! Unit tests for outcome codes and domain errors.

use rstest::rstest;

use super::*;

// ---------------------------------------------------------------------------
// ReturnCode
// ---------------------------------------------------------------------------

#[rstest]
#[case::success(ReturnCode::Success, "Success")]
#[case::unknown(ReturnCode::UnknownError, "Unknown error")]
#[case::nothing_found(
    ReturnCode::SearchNothingFound,
    "No plugins was found in that directory"
)]
#[case::bad_metadata(
    ReturnCode::SearchCannotParseMetadata,
    "Plugins metadata cannot be parsed (maybe they are invalid ?)"
)]
#[case::duplicate(
    ReturnCode::SearchNameAlreadyExists,
    "A plugin with the same name was already found"
)]
#[case::list_files(
    ReturnCode::SearchListFilesError,
    "An error occurs during the scan of the plugin dir"
)]
#[case::bad_version(
    ReturnCode::LoadDependencyBadVersion,
    "The plugin requires a dependency that's in an incorrect version"
)]
#[case::not_found(
    ReturnCode::LoadDependencyNotFound,
    "The plugin requires a dependency that wasn't found"
)]
#[case::cycle(
    ReturnCode::LoadDependencyCycle,
    "The dependencies graph contains a cycle, which makes impossible to load plugins"
)]
#[case::unload(ReturnCode::UnloadNotAll, "Not all plugins have been unloaded")]
fn message_is_fixed_phrase(#[case] code: ReturnCode, #[case] expected: &str) {
    assert_eq!(code.message(), expected);
    assert_eq!(code.to_string(), expected);
}

#[test]
fn only_success_is_success() {
    assert!(ReturnCode::Success.is_success());
    assert!(!ReturnCode::UnknownError.is_success());
    assert!(!ReturnCode::LoadDependencyCycle.is_success());
}

#[test]
fn boolean_coercion_round_trips() {
    assert!(bool::from(ReturnCode::Success));
    assert!(!bool::from(ReturnCode::SearchNothingFound));
    assert_eq!(ReturnCode::from(true), ReturnCode::Success);
    assert_eq!(ReturnCode::from(false), ReturnCode::UnknownError);
}

// ---------------------------------------------------------------------------
// PluginError
// ---------------------------------------------------------------------------

#[test]
fn symbol_not_found_names_symbol_and_path() {
    let err = PluginError::SymbolNotFound {
        path: "/lib/libalpha.so".into(),
        symbol: String::from("jp_name"),
    };
    let text = err.to_string();
    assert!(text.contains("jp_name"));
    assert!(text.contains("libalpha.so"));
}

#[test]
fn list_dir_preserves_io_source() {
    let err = PluginError::ListDir {
        path: "/nope".into(),
        source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
    };
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn incompatible_api_reports_both_versions() {
    let err = PluginError::IncompatibleApi {
        declared: String::from("2.0.0"),
        expected: String::from("1.0.0"),
    };
    let text = err.to_string();
    assert!(text.contains("2.0.0"));
    assert!(text.contains("1.0.0"));
}
