//! [Hashed N-Tuple Storage Layout Extension](https://ocfl.github.io/extensions/0004-hashed-n-tuple-storage-layout.html),
//! trimmed to the one configuration the pipeline uses: SHA-256, 3 tuples of 3 hex
//! characters, full digest as the encapsulating directory name.

use sha2::{Digest, Sha256};

const TUPLE_SIZE: usize = 3;
const NUMBER_OF_TUPLES: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct HashedNTupleLayout;

impl HashedNTupleLayout {
    /// Maps an object id to its object root, relative to the storage root.
    pub fn map_object_id(&self, object_id: &str) -> String {
        let digest = hex::encode(Sha256::digest(object_id.as_bytes()));
        digest_to_tuples(&digest, TUPLE_SIZE, NUMBER_OF_TUPLES) + &digest
    }
}

fn digest_to_tuples(digest: &str, tuple_size: usize, number_of_tuples: usize) -> String {
    let mut path = String::with_capacity((tuple_size + 1) * number_of_tuples);
    let bytes = digest.as_bytes();
    for i in 0..number_of_tuples {
        let start = i * tuple_size;
        let end = start + tuple_size;
        path.push_str(std::str::from_utf8(&bytes[start..end]).unwrap());
        path.push('/');
    }
    path
}
