//! Fixed OCFL filenames and extension identifiers. Trimmed to what the
//! `HashedNTupleLayout`, SHA-256-only adapter needs.

pub const REPO_NAMASTE_FILE: &str = "0=ocfl_1.0";
pub const OBJECT_NAMASTE_FILE: &str = "0=ocfl_object_1.0";
pub const REPO_NAMASTE_CONTENT: &str = "ocfl_1.0\n";
pub const OBJECT_NAMASTE_CONTENT: &str = "ocfl_object_1.0\n";

pub const INVENTORY_FILE: &str = "inventory.json";
pub const INVENTORY_TYPE: &str = "https://ocfl.io/1.0/spec/#inventory";

pub const OCFL_LAYOUT_FILE: &str = "ocfl_layout.json";
pub const EXTENSIONS_DIR: &str = "extensions";
pub const EXTENSIONS_CONFIG_FILE: &str = "config.json";

pub const DEFAULT_CONTENT_DIR: &str = "content";

pub const HASHED_NTUPLE_LAYOUT_EXTENSION: &str = "0004-hashed-n-tuple-storage-layout";
