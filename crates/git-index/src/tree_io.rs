//! Populating the index from a tree object (`git read-tree` semantics, single-tree form).

use bstr::BString;
use git_hash::ObjectId;
use git_object::{Object, Tree};
use git_odb::ObjectDatabase;

use crate::entry::{EntryFlags, IndexEntry, StatData};
use crate::{Index, IndexError, Stage};

/// Recursively populate an index with the stage-0 entries of `tree_id`.
///
/// Existing entries are discarded first — this mirrors `git read-tree <tree>`
/// without `-m`, replacing the index outright rather than merging into it.
pub fn read_tree(odb: &ObjectDatabase, tree_id: &ObjectId) -> Result<Index, IndexError> {
    let mut index = Index::new();
    let mut entries = Vec::new();
    collect_tree_entries(odb, tree_id, b"", &mut entries)?;
    for entry in entries {
        index.add(entry);
    }
    Ok(index)
}

fn collect_tree_entries(
    odb: &ObjectDatabase,
    tree_id: &ObjectId,
    prefix: &[u8],
    out: &mut Vec<IndexEntry>,
) -> Result<(), IndexError> {
    let tree = read_tree_object(odb, tree_id)?;

    for entry in tree.iter() {
        let mut path = prefix.to_vec();
        if !path.is_empty() {
            path.push(b'/');
        }
        path.extend_from_slice(&entry.name);

        if entry.mode.is_tree() {
            collect_tree_entries(odb, &entry.oid, &path, out)?;
        } else {
            out.push(IndexEntry {
                path: BString::from(path),
                oid: entry.oid,
                mode: entry.mode,
                stage: Stage::Normal,
                stat: StatData::default(),
                flags: EntryFlags::default(),
            });
        }
    }

    Ok(())
}

fn read_tree_object(odb: &ObjectDatabase, oid: &ObjectId) -> Result<Tree, IndexError> {
    let obj = odb
        .read(oid)?
        .ok_or_else(|| IndexError::InvalidEntry {
            offset: 0,
            reason: format!("tree object {oid} not found"),
        })?;
    match obj {
        Object::Tree(t) => Ok(t),
        other => Err(IndexError::InvalidEntry {
            offset: 0,
            reason: format!("expected tree object, got {}", other.object_type()),
        }),
    }
}
