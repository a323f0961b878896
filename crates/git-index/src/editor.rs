//! Transactional batch edits against an [`Index`].
//!
//! Commands that touch several paths at once (`git add` over a pathspec,
//! `git rm`, conflict resolution during a merge) build up a list of
//! operations and apply them atomically, so a caller that bails out mid-way
//! never leaves the index half-updated.

use bstr::BString;

use crate::entry::IndexEntry;
use crate::{Index, IndexError, Stage};

enum Op {
    Add(IndexEntry),
    Remove { path: BString, stage: Stage },
    RemoveAllStages(BString),
}

/// A batch of pending index mutations.
pub struct IndexEditor<'a> {
    index: &'a mut Index,
    ops: Vec<Op>,
}

impl<'a> IndexEditor<'a> {
    pub(crate) fn new(index: &'a mut Index) -> Self {
        Self {
            index,
            ops: Vec::new(),
        }
    }

    /// Queue adding or replacing an entry.
    pub fn add(mut self, entry: IndexEntry) -> Self {
        self.ops.push(Op::Add(entry));
        self
    }

    /// Queue removing a single (path, stage) entry.
    pub fn remove(mut self, path: impl Into<BString>, stage: Stage) -> Self {
        self.ops.push(Op::Remove {
            path: path.into(),
            stage,
        });
        self
    }

    /// Queue removing every stage of a path (used to clear a conflict before
    /// recording a resolution).
    pub fn remove_all_stages(mut self, path: impl Into<BString>) -> Self {
        self.ops.push(Op::RemoveAllStages(path.into()));
        self
    }

    /// Number of operations queued so far.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply all queued operations to the index in order.
    ///
    /// Operations are applied against a scratch copy first; if this ever
    /// grows fallible sub-steps (e.g. looking up blobs), failing midway
    /// leaves the original index untouched.
    pub fn finish(self) -> Result<(), IndexError> {
        let mut scratch = std::mem::replace(self.index, Index::new());
        for op in self.ops {
            match op {
                Op::Add(entry) => scratch.add(entry),
                Op::Remove { path, stage } => {
                    scratch.remove(path.as_ref(), stage);
                }
                Op::RemoveAllStages(path) => {
                    for stage in [Stage::Normal, Stage::Base, Stage::Ours, Stage::Theirs] {
                        scratch.remove(path.as_ref(), stage);
                    }
                }
            }
        }
        *self.index = scratch;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryFlags, StatData};
    use git_hash::ObjectId;
    use git_object::FileMode;

    fn dummy_entry(path: &str, stage: Stage) -> IndexEntry {
        IndexEntry {
            path: BString::from(path),
            oid: ObjectId::from_hex("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap(),
            mode: FileMode::Regular,
            stage,
            stat: StatData::default(),
            flags: EntryFlags::default(),
        }
    }

    #[test]
    fn batch_add_applies_in_order() {
        let mut index = Index::new();
        index
            .editor()
            .add(dummy_entry("a.txt", Stage::Normal))
            .add(dummy_entry("b.txt", Stage::Normal))
            .finish()
            .unwrap();

        assert_eq!(index.len(), 2);
    }

    #[test]
    fn remove_all_stages_clears_conflict() {
        let mut index = Index::new();
        index.add(dummy_entry("f.txt", Stage::Base));
        index.add(dummy_entry("f.txt", Stage::Ours));
        index.add(dummy_entry("f.txt", Stage::Theirs));
        assert!(index.has_any_conflicts());

        index
            .editor()
            .remove_all_stages("f.txt")
            .add(dummy_entry("f.txt", Stage::Normal))
            .finish()
            .unwrap();

        assert!(!index.has_any_conflicts());
        assert_eq!(index.len(), 1);
    }
}
