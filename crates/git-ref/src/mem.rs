//! In-memory reference store, for tests and ephemeral/embedded repositories.

use std::collections::HashMap;
use std::sync::RwLock;

use git_hash::ObjectId;

use crate::error::RefError;
use crate::name::RefName;
use crate::reflog::ReflogEntry;
use crate::store::{RefStore, RefTransaction, RefUpdateAction};
use crate::Reference;

const MAX_SYMREF_DEPTH: usize = 10;

/// `RefStore` backed by a `HashMap`, guarded by an `RwLock`.
///
/// Mirrors [`crate::FilesRefStore`]'s semantics (CAS-checked transactional
/// updates, symbolic ref following, reflog per ref) without touching disk.
#[derive(Default)]
pub struct MemRefStore {
    refs: RwLock<HashMap<RefName, Reference>>,
    reflogs: RwLock<HashMap<RefName, Vec<ReflogEntry>>>,
}

impl MemRefStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a direct ref without going through a transaction (test/bootstrap helper).
    pub fn set_direct(&self, name: &str, target: ObjectId) -> Result<(), RefError> {
        let name = RefName::new(name)?;
        self.refs.write().unwrap().insert(name.clone(), Reference::Direct { name, target });
        Ok(())
    }

    fn resolve_inner(&self, name: &RefName, depth: usize) -> Result<Option<ObjectId>, RefError> {
        if depth > MAX_SYMREF_DEPTH {
            return Err(RefError::SymrefLoop(name.as_str().to_string()));
        }
        match self.refs.read().unwrap().get(name).cloned() {
            Some(Reference::Direct { target, .. }) => Ok(Some(target)),
            Some(Reference::Symbolic { target, .. }) => self.resolve_inner(&target, depth + 1),
            None => Ok(None),
        }
    }

    /// Apply a transaction atomically: validate every CAS check first, then
    /// apply all updates. No partial application on failure.
    pub fn commit_transaction(&self, transaction: RefTransaction) -> Result<(), RefError> {
        let mut refs = self.refs.write().unwrap();

        for update in transaction.updates() {
            match &update.action {
                RefUpdateAction::Create { .. } => {
                    if refs.contains_key(&update.name) {
                        return Err(RefError::AlreadyExists(update.name.as_str().to_string()));
                    }
                }
                RefUpdateAction::Update { old_target, .. } => {
                    let current = refs.get(&update.name).and_then(Reference::target_oid);
                    if current != Some(*old_target) {
                        return Err(RefError::CasFailed {
                            name: update.name.as_str().to_string(),
                            expected: *old_target,
                            actual: current.unwrap_or(ObjectId::NULL_SHA1),
                        });
                    }
                }
                RefUpdateAction::Delete { old_target } => {
                    let current = refs.get(&update.name).and_then(Reference::target_oid);
                    if current != Some(*old_target) {
                        return Err(RefError::CasFailed {
                            name: update.name.as_str().to_string(),
                            expected: *old_target,
                            actual: current.unwrap_or(ObjectId::NULL_SHA1),
                        });
                    }
                }
                RefUpdateAction::SetSymbolic { .. } => {}
            }
        }

        for update in transaction.updates() {
            match &update.action {
                RefUpdateAction::Create { new_target } | RefUpdateAction::Update { new_target, .. } => {
                    refs.insert(
                        update.name.clone(),
                        Reference::Direct { name: update.name.clone(), target: *new_target },
                    );
                }
                RefUpdateAction::Delete { .. } => {
                    refs.remove(&update.name);
                }
                RefUpdateAction::SetSymbolic { target } => {
                    refs.insert(
                        update.name.clone(),
                        Reference::Symbolic { name: update.name.clone(), target: target.clone() },
                    );
                }
            }
        }

        Ok(())
    }
}

impl RefStore for MemRefStore {
    fn resolve(&self, name: &RefName) -> Result<Option<Reference>, RefError> {
        Ok(self.refs.read().unwrap().get(name).cloned())
    }

    fn resolve_to_oid(&self, name: &RefName) -> Result<Option<ObjectId>, RefError> {
        self.resolve_inner(name, 0)
    }

    fn iter(
        &self,
        prefix: Option<&str>,
    ) -> Result<Box<dyn Iterator<Item = Result<Reference, RefError>> + '_>, RefError> {
        let mut refs: Vec<Reference> = self
            .refs
            .read()
            .unwrap()
            .values()
            .filter(|r| match prefix {
                Some(p) => r.name().as_str().starts_with(p),
                None => true,
            })
            .cloned()
            .collect();
        refs.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(Box::new(refs.into_iter().map(Ok)))
    }

    fn reflog(&self, name: &RefName) -> Result<Vec<ReflogEntry>, RefError> {
        Ok(self.reflogs.read().unwrap().get(name).cloned().unwrap_or_default())
    }

    fn append_reflog(&self, name: &RefName, entry: &ReflogEntry) -> Result<(), RefError> {
        self.reflogs.write().unwrap().entry(name.clone()).or_default().push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_ref_resolves() {
        let store = MemRefStore::new();
        let oid = ObjectId::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
        store.set_direct("refs/heads/main", oid).unwrap();
        assert_eq!(
            store.resolve_to_oid(&RefName::new("refs/heads/main").unwrap()).unwrap(),
            Some(oid)
        );
    }

    #[test]
    fn symbolic_ref_follows_chain() {
        let store = MemRefStore::new();
        let oid = ObjectId::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
        store.set_direct("refs/heads/main", oid).unwrap();

        let mut tx = RefTransaction::new();
        tx.set_symbolic(RefName::new("HEAD").unwrap(), RefName::new("refs/heads/main").unwrap(), "checkout");
        store.commit_transaction(tx).unwrap();

        assert_eq!(store.resolve_to_oid(&RefName::new("HEAD").unwrap()).unwrap(), Some(oid));
    }

    #[test]
    fn cas_update_rejects_stale_old_value() {
        let store = MemRefStore::new();
        let a = ObjectId::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
        let b = ObjectId::from_hex("0000000000000000000000000000000000000001").unwrap();
        let name = RefName::new("refs/heads/main").unwrap();
        store.set_direct("refs/heads/main", a).unwrap();

        let mut tx = RefTransaction::new();
        tx.update(name, b, a, "wrong old value");
        assert!(store.commit_transaction(tx).is_err());
    }
}
