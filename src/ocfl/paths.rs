//! Path helpers for locating files within the storage root and object roots.

use std::path::{Path, PathBuf};

use super::consts::*;

pub fn root_namaste_path(storage_root: impl AsRef<Path>) -> PathBuf {
    storage_root.as_ref().join(REPO_NAMASTE_FILE)
}

pub fn object_namaste_path(object_root: impl AsRef<Path>) -> PathBuf {
    object_root.as_ref().join(OBJECT_NAMASTE_FILE)
}

pub fn ocfl_layout_path(storage_root: impl AsRef<Path>) -> PathBuf {
    storage_root.as_ref().join(OCFL_LAYOUT_FILE)
}

pub fn extensions_path(dir: impl AsRef<Path>) -> PathBuf {
    dir.as_ref().join(EXTENSIONS_DIR)
}

pub fn layout_extension_config_path(storage_root: impl AsRef<Path>) -> PathBuf {
    extensions_path(storage_root)
        .join(HASHED_NTUPLE_LAYOUT_EXTENSION)
        .join(EXTENSIONS_CONFIG_FILE)
}

pub fn inventory_path(dir: impl AsRef<Path>) -> PathBuf {
    dir.as_ref().join(INVENTORY_FILE)
}

pub fn version_path(object_root: impl AsRef<Path>, version_num: u32) -> PathBuf {
    object_root.as_ref().join(format!("v{}", version_num))
}

pub fn content_path(version_root: impl AsRef<Path>) -> PathBuf {
    version_root.as_ref().join(DEFAULT_CONTENT_DIR)
}
