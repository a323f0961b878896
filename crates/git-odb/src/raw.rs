//! Pluggable raw storage: the primitive `put`/`get`/`has`/`delete`/`enumerate`
//! byte interface that a loose-object backend is built from.
//!
//! `FsRawStorage` persists wire-format bytes to disk (delegating compression
//! and atomic placement to [`git_loose::LooseObjectStore`]); `MemRawStorage`
//! keeps them in a `HashMap` guarded by an `RwLock`. Both are wrapped by
//! [`RawBackedStore`], which implements [`OdbBackend`] on top of either,
//! giving [`crate::ObjectDatabase`] a true in-memory storage option alongside
//! the filesystem and pack-file backends.

use std::collections::HashMap;
use std::sync::RwLock;

use git_hash::hasher::Hasher;
use git_hash::{HashAlgorithm, ObjectId};
use git_object::{header, Object, ObjectType};

use crate::backend::OdbBackend;
use crate::OdbError;

/// Pluggable raw byte storage keyed by content-addressed OID.
///
/// `put`/`get` operate on pre-encoded wire-format bytes
/// (`"<type> <size>\0<content>"`); the caller is responsible for ensuring
/// `key` is the hash of those bytes.
pub trait RawStorage: Send + Sync {
    fn put(&self, key: &ObjectId, wire_bytes: &[u8]) -> Result<(), OdbError>;
    fn get(&self, key: &ObjectId) -> Result<Option<Vec<u8>>, OdbError>;
    fn has(&self, key: &ObjectId) -> bool;
    fn delete(&self, key: &ObjectId) -> Result<(), OdbError>;
    fn enumerate(&self) -> Result<Box<dyn Iterator<Item = Result<ObjectId, OdbError>> + '_>, OdbError>;
}

/// Filesystem-backed raw storage (wraps the zlib loose-object store).
pub struct FsRawStorage {
    loose: git_loose::LooseObjectStore,
}

impl FsRawStorage {
    pub fn new(loose: git_loose::LooseObjectStore) -> Self {
        Self { loose }
    }
}

impl RawStorage for FsRawStorage {
    fn put(&self, key: &ObjectId, wire_bytes: &[u8]) -> Result<(), OdbError> {
        Ok(self.loose.store_wire(key, wire_bytes)?)
    }

    fn get(&self, key: &ObjectId) -> Result<Option<Vec<u8>>, OdbError> {
        Ok(self.loose.load_wire(key)?)
    }

    fn has(&self, key: &ObjectId) -> bool {
        self.loose.contains(key)
    }

    fn delete(&self, key: &ObjectId) -> Result<(), OdbError> {
        let path = self.loose.object_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OdbError::Io(e)),
        }
    }

    fn enumerate(&self) -> Result<Box<dyn Iterator<Item = Result<ObjectId, OdbError>> + '_>, OdbError> {
        let iter = self.loose.iter()?;
        Ok(Box::new(iter.map(|r| r.map_err(OdbError::from))))
    }
}

/// In-memory raw storage, for tests and embedded/ephemeral repositories.
#[derive(Default)]
pub struct MemRawStorage {
    entries: RwLock<HashMap<ObjectId, Vec<u8>>>,
}

impl MemRawStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RawStorage for MemRawStorage {
    fn put(&self, key: &ObjectId, wire_bytes: &[u8]) -> Result<(), OdbError> {
        self.entries
            .write()
            .unwrap()
            .entry(*key)
            .or_insert_with(|| wire_bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &ObjectId) -> Result<Option<Vec<u8>>, OdbError> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    fn has(&self, key: &ObjectId) -> bool {
        self.entries.read().unwrap().contains_key(key)
    }

    fn delete(&self, key: &ObjectId) -> Result<(), OdbError> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }

    fn enumerate(&self) -> Result<Box<dyn Iterator<Item = Result<ObjectId, OdbError>> + '_>, OdbError> {
        let ids: Vec<ObjectId> = self.entries.read().unwrap().keys().copied().collect();
        Ok(Box::new(ids.into_iter().map(Ok)))
    }
}

/// Object-level backend built generically over any [`RawStorage`].
///
/// Implements [`OdbBackend`], so it slots in wherever
/// [`git_loose::LooseObjectStore`] would (e.g. as the loose layer of an
/// [`crate::ObjectDatabase`]), but works over any byte store.
pub struct RawBackedStore<S: RawStorage> {
    raw: S,
    hash_algo: HashAlgorithm,
}

impl<S: RawStorage> RawBackedStore<S> {
    pub fn new(raw: S, hash_algo: HashAlgorithm) -> Self {
        Self { raw, hash_algo }
    }
}

impl<S: RawStorage> OdbBackend for RawBackedStore<S> {
    fn read(&self, oid: &ObjectId) -> Result<Option<Object>, OdbError> {
        match self.raw.get(oid)? {
            Some(wire) => {
                let obj = Object::parse(&wire).map_err(|e| OdbError::Corrupt {
                    oid: *oid,
                    reason: e.to_string(),
                })?;
                Ok(Some(obj))
            }
            None => Ok(None),
        }
    }

    fn read_header(&self, oid: &ObjectId) -> Result<Option<(ObjectType, usize)>, OdbError> {
        match self.raw.get(oid)? {
            Some(wire) => {
                let (ty, size, _) = header::parse_header(&wire).map_err(|e| OdbError::Corrupt {
                    oid: *oid,
                    reason: e.to_string(),
                })?;
                Ok(Some((ty, size)))
            }
            None => Ok(None),
        }
    }

    fn contains(&self, oid: &ObjectId) -> bool {
        self.raw.has(oid)
    }

    fn write(&self, obj: &Object) -> Result<ObjectId, OdbError> {
        let content = obj.serialize_content();
        let hdr = header::write_header(obj.object_type(), content.len());
        let oid = {
            let mut hasher = Hasher::new(self.hash_algo);
            hasher.update(&hdr);
            hasher.update(&content);
            hasher.finalize().map_err(|e| OdbError::Corrupt {
                oid: ObjectId::NULL_SHA1,
                reason: e.to_string(),
            })?
        };
        let mut wire = Vec::with_capacity(hdr.len() + content.len());
        wire.extend_from_slice(&hdr);
        wire.extend_from_slice(&content);
        self.raw.put(&oid, &wire)?;
        Ok(oid)
    }

    fn lookup_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>, OdbError> {
        let mut matches = Vec::new();
        for result in self.raw.enumerate()? {
            let oid = result?;
            if oid.starts_with_hex(prefix) {
                matches.push(oid);
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_object::Blob;

    #[test]
    fn mem_raw_storage_roundtrip() {
        let store = RawBackedStore::new(MemRawStorage::new(), HashAlgorithm::Sha1);
        let obj = Object::Blob(Blob::new(b"hello".to_vec()));
        let oid = store.write(&obj).unwrap();
        assert!(store.contains(&oid));
        let read_back = store.read(&oid).unwrap().unwrap();
        assert_eq!(read_back, obj);
    }

    #[test]
    fn mem_raw_storage_idempotent_write() {
        let store = RawBackedStore::new(MemRawStorage::new(), HashAlgorithm::Sha1);
        let obj = Object::Blob(Blob::new(b"same bytes".to_vec()));
        let oid1 = store.write(&obj).unwrap();
        let oid2 = store.write(&obj).unwrap();
        assert_eq!(oid1, oid2);
    }

    #[test]
    fn mem_raw_storage_missing() {
        let store = RawBackedStore::new(MemRawStorage::new(), HashAlgorithm::Sha1);
        let oid = ObjectId::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
        assert!(store.read(&oid).unwrap().is_none());
        assert!(!store.contains(&oid));
    }

    #[test]
    fn lookup_prefix_matches() {
        let store = RawBackedStore::new(MemRawStorage::new(), HashAlgorithm::Sha1);
        let oid = store
            .write(&Object::Blob(Blob::new(b"prefix test".to_vec())))
            .unwrap();
        let hex = oid.to_hex();
        let matches = store.lookup_prefix(&hex[..6]).unwrap();
        assert_eq!(matches, vec![oid]);
    }
}
