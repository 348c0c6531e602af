//! Temporary configuration files for loader tests.

use std::io::Write;
use std::path::PathBuf;

/// Creates a temporary directory.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}

/// Writes `contents` to `name` inside a fresh temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the path is used.
pub fn write_temp_config(name: &str, contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = temp_test_dir();
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("Failed to create config file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write config file");
    (dir, path)
}
