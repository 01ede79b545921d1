//! A trimmed, purpose-built OCFL adapter: binds to a filesystem repository laid out
//! with the Hashed N-Tuple storage layout and SHA-256 digests, classifies candidate
//! objects against the HEAD version, and commits new versions atomically.
//!
//! This is not a general-purpose OCFL client -- it implements exactly the surface
//! `spec.md` 4.4 describes. Grounded in `rocfl`'s `ocfl` module.

mod consts;
mod digest;
mod inventory;
mod layout;
mod paths;
mod store;

pub use digest::{hash_bytes, HexDigest};
pub use store::{Classification, LocalStore};
