//! The Local Store: binds to a filesystem OCFL repository, classifies candidate DR
//! Objects against the HEAD version's file digests, and commits batches as new OCFL
//! versions. Grounded in `rocfl`'s `ocfl::repo::OcflRepo` and
//! `ocfl::store::fs::FsOcflStore`, trimmed to exactly the operations `spec.md` 4.4
//! describes: no CLI-facing listing/diff/copy/move, no mutable-head, no S3 backend.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::Mutex as AsyncMutex;

use super::consts::*;
use super::digest::{DigestReader, HexDigest};
use super::inventory::Inventory;
use super::layout::HashedNTupleLayout;
use super::paths;
use crate::error::{ReplicatorError, Result};
use crate::model::{DrObject, EntityRef, StagedWrite};

/// The result of classifying a batch's candidate set against the local store.
/// Objects that are already present with a matching digest are simply omitted --
/// they are implicitly "unchanged" and require no further action.
#[derive(Debug, Default)]
pub struct Classification {
    pub missing: Vec<DrObject>,
    pub changed: Vec<DrObject>,
    pub unchanged_count: usize,
}

pub struct LocalStore {
    storage_root: PathBuf,
    work_dir: PathBuf,
    layout: HashedNTupleLayout,
    locks: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LocalStore {
    /// Opens (creating if necessary) the OCFL repository rooted at `storage_root`,
    /// using `work_dir` as scratch space for assembling new versions before they are
    /// atomically moved into place.
    pub fn open(storage_root: impl AsRef<Path>, work_dir: impl AsRef<Path>) -> Result<Self> {
        let storage_root = storage_root.as_ref().to_path_buf();
        let work_dir = work_dir.as_ref().to_path_buf();

        fs::create_dir_all(&storage_root)?;
        fs::create_dir_all(&work_dir)?;

        let namaste = paths::root_namaste_path(&storage_root);
        if !namaste.exists() {
            info!("Initializing OCFL storage root at {}", storage_root.display());
            fs::write(&namaste, REPO_NAMASTE_CONTENT)?;
            let layout_config = paths::ocfl_layout_path(&storage_root);
            fs::write(
                &layout_config,
                serde_json::to_vec_pretty(&serde_json::json!({
                    "extension": HASHED_NTUPLE_LAYOUT_EXTENSION,
                    "description": "SHA-256 hashed n-tuple storage layout"
                }))?,
            )?;

            let extension_config = paths::layout_extension_config_path(&storage_root);
            fs::create_dir_all(extension_config.parent().unwrap())?;
            fs::write(
                &extension_config,
                serde_json::to_vec_pretty(&serde_json::json!({
                    "extensionName": HASHED_NTUPLE_LAYOUT_EXTENSION,
                    "digestAlgorithm": "sha256",
                    "tupleSize": 3,
                    "numberOfTuples": 3,
                    "shortObjectRoot": false
                }))?,
            )?;
        }

        Ok(Self {
            storage_root,
            work_dir,
            layout: HashedNTupleLayout,
            locks: std::sync::Mutex::new(HashMap::new()),
        })
    }

    /// Resolves the on-disk root directory for an OCFL object id under this store's
    /// storage root. Useful for callers that need to inspect committed bytes directly.
    pub fn object_root(&self, object_id: &str) -> PathBuf {
        self.storage_root.join(self.layout.map_object_id(object_id))
    }

    fn object_exists(&self, object_id: &str) -> bool {
        paths::object_namaste_path(self.object_root(object_id)).exists()
    }

    fn read_inventory(&self, object_id: &str) -> Result<Inventory> {
        let path = paths::inventory_path(self.object_root(object_id));
        let bytes = fs::read(&path).map_err(|e| {
            ReplicatorError::Storage(format!("failed to read inventory for {}: {}", object_id, e))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Classifies every candidate into `missing` (object does not yet exist locally,
    /// or the file is absent from the HEAD version) or `changed` (file exists with a
    /// different digest). Candidates that are present with a matching digest are
    /// dropped silently -- they are the idempotent no-op case.
    pub fn classify(&self, candidates: Vec<DrObject>) -> Result<Classification> {
        let mut by_io: HashMap<EntityRef, Vec<DrObject>> = HashMap::new();
        for c in candidates {
            by_io.entry(c.io_ref()).or_default().push(c);
        }

        let mut result = Classification::default();

        for (io_ref, group) in by_io {
            let object_id = io_ref.to_string();

            if !self.object_exists(&object_id) {
                result.missing.extend(group);
                continue;
            }

            let inventory = self.read_inventory(&object_id)?;

            for candidate in group {
                match inventory.head_digest_for(candidate.destination_path()) {
                    None => result.missing.push(candidate),
                    Some(existing) => {
                        let expected = candidate.expected_digest_hex();
                        if existing.eq_ignore_ascii_case(&expected) {
                            result.unchanged_count += 1;
                        } else {
                            result.changed.push(candidate);
                        }
                    }
                }
            }
        }

        Ok(result)
    }

    /// Commits all staged writes destined for a single OCFL object as one new
    /// version. Creates the object if it does not already exist. Serializes commits
    /// per object id so that concurrent batches never race to open two new versions
    /// of the same object.
    pub async fn commit(&self, io_ref: EntityRef, staged: &[StagedWrite]) -> Result<()> {
        if staged.is_empty() {
            return Ok(());
        }

        let object_id = io_ref.to_string();
        let lock = self.object_lock(&object_id);
        let _guard = lock.lock().await;

        if self.object_exists(&object_id) {
            self.commit_new_version(&object_id, staged)
        } else {
            self.commit_new_object(&object_id, staged)
        }
    }

    /// Copies a staged file into the object's content tree while hashing it in the
    /// same pass, and rejects it if the bytes don't actually hash to the digest the
    /// resolver declared -- a corrupt download or a stale staging entry must fail the
    /// commit rather than land silently under a digest it doesn't match.
    fn copy_verified(&self, src: &Path, dest: &Path, expected_hex: &str) -> Result<()> {
        let source = fs::File::open(src)?;
        let mut reader = DigestReader::new(source);
        let mut dest_file = fs::File::create(dest)?;
        io::copy(&mut reader, &mut dest_file)?;
        let actual = reader.finalize_hex();

        if !actual.as_str().eq_ignore_ascii_case(expected_hex) {
            return Err(ReplicatorError::Storage(format!(
                "staged file {} hashes to {} but was declared as {}",
                src.display(),
                actual,
                expected_hex
            )));
        }

        Ok(())
    }

    fn object_lock(&self, object_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(object_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Builds a brand new object entirely in a temp directory, then atomically moves
    /// it into its final storage location. The object never appears half-built at
    /// its final path.
    fn commit_new_object(&self, object_id: &str, staged: &[StagedWrite]) -> Result<()> {
        let tmp = tempfile::Builder::new()
            .prefix("ocfl-object-")
            .tempdir_in(&self.work_dir)?;
        let build_root = tmp.path();

        let mut inventory = Inventory::new(object_id);
        inventory.start_next_version()?;

        let content_dir = paths::content_path(build_root.join("v1"));
        fs::create_dir_all(&content_dir)?;

        for write in staged {
            let content_path = format!("v1/{}/{}", DEFAULT_CONTENT_DIR, write.destination_path);
            let target = build_root.join(&content_path);
            fs::create_dir_all(target.parent().unwrap())?;
            self.copy_verified(&write.staging_path, &target, &write.expected_digest_hex)?;
            let digest = HexDigest::from(write.expected_digest_hex.clone());
            inventory.put_file(&write.destination_path, &content_path, &digest)?;
        }

        fs::write(paths::object_namaste_path(build_root), OBJECT_NAMASTE_CONTENT)?;
        fs::write(
            paths::inventory_path(build_root),
            serde_json::to_vec_pretty(&inventory)?,
        )?;

        let final_root = self.object_root(object_id);
        fs::create_dir_all(final_root.parent().unwrap())?;

        if final_root.exists() {
            return Err(ReplicatorError::Storage(format!(
                "object {} already exists at {}",
                object_id,
                final_root.display()
            )));
        }

        info!("Creating new OCFL object {} at {}", object_id, final_root.display());
        fs::rename(build_root, &final_root)?;

        Ok(())
    }

    /// Assembles the new version's content in a temp directory, atomically renames it
    /// into the object root, and only then overwrites `inventory.json`. If the
    /// inventory write fails after the version directory lands, the orphaned
    /// directory is never referenced by the (unchanged) inventory, so the old HEAD
    /// remains the live view.
    fn commit_new_version(&self, object_id: &str, staged: &[StagedWrite]) -> Result<()> {
        let object_root = self.object_root(object_id);
        let mut inventory = self.read_inventory(object_id)?;
        inventory.start_next_version()?;
        let version_name = inventory.head_version_name();

        let tmp = tempfile::Builder::new()
            .prefix("ocfl-version-")
            .tempdir_in(&self.work_dir)?;
        let content_dir = paths::content_path(tmp.path());
        fs::create_dir_all(&content_dir)?;

        for write in staged {
            let digest = HexDigest::from(write.expected_digest_hex.clone());

            let content_path = match inventory.existing_content_path(&digest) {
                Some(existing) => existing.to_string(),
                None => {
                    let content_path =
                        format!("{}/{}/{}", version_name, DEFAULT_CONTENT_DIR, write.destination_path);
                    let target = paths::content_path(tmp.path()).join(&write.destination_path);
                    fs::create_dir_all(target.parent().unwrap())?;
                    self.copy_verified(&write.staging_path, &target, &write.expected_digest_hex)?;
                    content_path
                }
            };

            inventory.put_file(&write.destination_path, &content_path, &digest)?;
        }

        let final_version_path = paths::version_path(&object_root, inventory.head);
        if final_version_path.exists() {
            return Err(ReplicatorError::Storage(format!(
                "version {} of object {} already exists",
                version_name, object_id
            )));
        }

        info!("Creating version {} of object {}", version_name, object_id);
        fs::rename(tmp.into_path(), &final_version_path)?;

        let inventory_bytes = serde_json::to_vec_pretty(&inventory)?;
        let tmp_inventory = object_root.join(format!("{}.tmp", INVENTORY_FILE));
        if let Err(e) = fs::write(&tmp_inventory, &inventory_bytes)
            .and_then(|_| fs::rename(&tmp_inventory, paths::inventory_path(&object_root)))
        {
            warn!(
                "Version {} directory was created for object {} but the inventory update failed: {}. \
                 The old HEAD remains the live view; manual cleanup of the orphaned version directory may be needed.",
                version_name, object_id, e
            );
            return Err(ReplicatorError::Storage(format!(
                "failed to publish new inventory for {}: {}",
                object_id, e
            )));
        }

        Ok(())
    }
}
