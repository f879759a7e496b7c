//! Scratch directories for cache and output tests.

use std::path::Path;

/// Fresh temporary directory, removed when the returned `TempDir` drops.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("cloudmap_test_")
        .tempdir()
        .expect("Failed to create temporary test directory")
}

/// Write `contents` to every path, creating parent directories.
pub fn touch_files<P: AsRef<Path>>(paths: &[P], contents: &[u8]) {
    for path in paths {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(path, contents).expect("Failed to write test file");
    }
}

/// Sorted names of the regular files directly inside `dir`.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to read test directory")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}
