//! Contract fixture loader.
//!
//! Loads golden files from `contracts/` so both sides of the broker contract
//! assert against the same bytes.

use std::path::{Path, PathBuf};

use serde_json::Value;

/// Load a JSON fixture file relative to the workspace root.
///
/// # Example
/// ```no_run
/// use userhub_testing::fixture::Fixture;
/// let val = Fixture::load("contracts/events/user_created.json");
/// ```
pub struct Fixture;

impl Fixture {
    /// Load and parse a fixture JSON file at `workspace_root/path`.
    ///
    /// Panics if the file is missing or invalid JSON.
    pub fn load(relative_path: &str) -> Value {
        let full_path = workspace_root().join(relative_path);
        let contents = std::fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("fixture not found at {}: {}", full_path.display(), e));
        serde_json::from_str(&contents)
            .unwrap_or_else(|e| panic!("invalid JSON in fixture {}: {}", relative_path, e))
    }

    /// Load a fixture as raw bytes, exactly as a broker would deliver it.
    pub fn bytes(relative_path: &str) -> Vec<u8> {
        let value = Self::load(relative_path);
        serde_json::to_vec(&value).unwrap_or_else(|e| panic!("re-encode {relative_path}: {e}"))
    }
}

/// Walk up from the crate under test to the directory holding `contracts/`.
fn workspace_root() -> PathBuf {
    let start = std::env::var("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::current_dir().unwrap());
    let found = start
        .ancestors()
        .find(|a| a.join("contracts").is_dir())
        .map(Path::to_path_buf);
    found.unwrap_or(start)
}
