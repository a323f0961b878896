//! Merge base computation using the paint algorithm.
//!
//! The paint algorithm marks commits reachable from each input with a
//! distinct flag. A commit painted with both flags is a common ancestor;
//! the lowest common ancestors are the merge bases.

use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use git_hash::ObjectId;
use git_object::Object;
use git_repository::Repository;

use crate::DiffError;

const PARENT1: u8 = 1;
const PARENT2: u8 = 2;
const STALE: u8 = 4;

struct PaintEntry {
    oid: ObjectId,
    date: i64,
}

impl PartialEq for PaintEntry {
    fn eq(&self, other: &Self) -> bool {
        self.oid == other.oid
    }
}

impl Eq for PaintEntry {}

impl PartialOrd for PaintEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PaintEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap by commit date; ties break on OID so results are deterministic.
        self.date.cmp(&other.date).then_with(|| self.oid.cmp(&other.oid))
    }
}

/// Find all merge bases of two commits: the lowest common ancestors.
pub fn merge_base(repo: &Repository, a: &ObjectId, b: &ObjectId) -> Result<Vec<ObjectId>, DiffError> {
    if a == b {
        return Ok(vec![*a]);
    }
    let results = paint_down_to_common(repo, a, b)?;
    remove_redundant(repo, results)
}

/// Find all merge bases among more than two tips (used for octopus-style virtual bases).
pub fn merge_base_many(repo: &Repository, tips: &[ObjectId]) -> Result<Vec<ObjectId>, DiffError> {
    match tips {
        [] => Ok(Vec::new()),
        [single] => Ok(vec![*single]),
        [first, rest @ ..] => {
            let mut bases = vec![*first];
            for tip in rest {
                let mut next_bases = Vec::new();
                for base in &bases {
                    next_bases.extend(merge_base(repo, base, tip)?);
                }
                bases = next_bases;
                if bases.is_empty() {
                    break;
                }
            }
            remove_redundant(repo, bases)
        }
    }
}

/// Find a single, arbitrary-but-deterministic best merge base.
pub fn merge_base_one(repo: &Repository, a: &ObjectId, b: &ObjectId) -> Result<Option<ObjectId>, DiffError> {
    Ok(merge_base(repo, a, b)?.into_iter().next())
}

/// Check if `ancestor` is an ancestor of (or equal to) `descendant`.
pub fn is_ancestor(repo: &Repository, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool, DiffError> {
    is_ancestor_direct(repo, ancestor, descendant)
}

fn paint_down_to_common(repo: &Repository, a: &ObjectId, b: &ObjectId) -> Result<Vec<ObjectId>, DiffError> {
    let mut flags: HashMap<ObjectId, u8> = HashMap::new();
    let mut queue: BinaryHeap<PaintEntry> = BinaryHeap::new();
    let mut results: Vec<ObjectId> = Vec::new();

    let commit_a = read_commit(repo, a)?;
    let commit_b = read_commit(repo, b)?;

    flags.insert(*a, PARENT1);
    flags.insert(*b, PARENT2);

    queue.push(PaintEntry { oid: *a, date: commit_a.committer.date.timestamp });
    queue.push(PaintEntry { oid: *b, date: commit_b.committer.date.timestamp });

    while let Some(entry) = queue.pop() {
        let current_flags = *flags.get(&entry.oid).unwrap_or(&0);
        if current_flags & STALE != 0 {
            continue;
        }

        if current_flags & (PARENT1 | PARENT2) == (PARENT1 | PARENT2) {
            flags.insert(entry.oid, current_flags | STALE);
            results.push(entry.oid);
            if !queue_has_nonstale(&queue, &flags) {
                break;
            }
            continue;
        }

        let commit = read_commit(repo, &entry.oid)?;
        for parent in &commit.parents {
            let parent_flags = flags.entry(*parent).or_insert(0);
            let new_flags = *parent_flags | current_flags;
            if new_flags != *parent_flags {
                *parent_flags = new_flags;
                if let Ok(parent_commit) = read_commit(repo, parent) {
                    queue.push(PaintEntry { oid: *parent, date: parent_commit.committer.date.timestamp });
                }
            }
        }
    }

    Ok(results)
}

fn queue_has_nonstale(queue: &BinaryHeap<PaintEntry>, flags: &HashMap<ObjectId, u8>) -> bool {
    queue.iter().any(|entry| flags.get(&entry.oid).copied().unwrap_or(0) & STALE == 0)
}

/// Drop bases that are themselves ancestors of another base in the set.
fn remove_redundant(repo: &Repository, bases: Vec<ObjectId>) -> Result<Vec<ObjectId>, DiffError> {
    if bases.len() <= 1 {
        return Ok(bases);
    }

    let mut to_remove: HashSet<usize> = HashSet::new();
    for i in 0..bases.len() {
        if to_remove.contains(&i) {
            continue;
        }
        for j in (i + 1)..bases.len() {
            if to_remove.contains(&j) {
                continue;
            }
            if is_ancestor_direct(repo, &bases[i], &bases[j])? {
                to_remove.insert(i);
                break;
            } else if is_ancestor_direct(repo, &bases[j], &bases[i])? {
                to_remove.insert(j);
            }
        }
    }

    Ok(bases
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !to_remove.contains(idx))
        .map(|(_, oid)| oid)
        .collect())
}

fn is_ancestor_direct(repo: &Repository, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool, DiffError> {
    if ancestor == descendant {
        return Ok(true);
    }

    let mut queue = VecDeque::new();
    let mut visited = HashSet::new();
    queue.push_back(*descendant);
    visited.insert(*descendant);

    while let Some(current) = queue.pop_front() {
        if current == *ancestor {
            return Ok(true);
        }
        if let Ok(commit) = read_commit(repo, &current) {
            for parent in &commit.parents {
                if visited.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
        }
    }

    Ok(false)
}

fn read_commit(repo: &Repository, oid: &ObjectId) -> Result<git_object::Commit, DiffError> {
    let obj = repo
        .odb()
        .read(oid)
        .map_err(|source| DiffError::ObjectRead { oid: *oid, source })?
        .ok_or(DiffError::ObjectNotFound(*oid))?;
    match obj {
        Object::Commit(c) => Ok(c),
        other => Err(DiffError::UnexpectedObjectType {
            oid: *oid,
            expected: "commit",
            actual: other.object_type().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_object::{Commit, Tree};
    use git_utils::date::{GitDate, Signature};

    fn commit_at(repo: &Repository, parents: Vec<ObjectId>, msg: &str, when: i64) -> ObjectId {
        let who = Signature {
            name: "Test".into(),
            email: "test@example.com".into(),
            date: GitDate { timestamp: when, tz_offset: 0 },
        };
        let tree = repo.odb().write(&Object::Tree(Tree::new())).unwrap();
        let commit = Commit {
            tree,
            parents,
            author: who.clone(),
            committer: who,
            encoding: None,
            gpgsig: None,
            extra_headers: vec![],
            message: msg.into(),
        };
        repo.odb().write(&Object::Commit(commit)).unwrap()
    }

    #[test]
    fn identical_commits_are_their_own_base() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let c = commit_at(&repo, vec![], "root", 1000);
        assert_eq!(merge_base(&repo, &c, &c).unwrap(), vec![c]);
    }

    #[test]
    fn linear_history_base_is_common_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let root = commit_at(&repo, vec![], "root", 1000);
        let left = commit_at(&repo, vec![root], "left", 1001);
        let right = commit_at(&repo, vec![root], "right", 1002);
        let bases = merge_base(&repo, &left, &right).unwrap();
        assert_eq!(bases, vec![root]);
        assert!(is_ancestor(&repo, &root, &left).unwrap());
        assert!(!is_ancestor(&repo, &left, &right).unwrap());
    }
}
