//! rev-parse grammar: hex OIDs/prefixes, ref shorthand, and suffix operators
//! (`~N`, `^N`, `^{type}`).
//!
//! This is the single resolver behind every command that accepts a revision
//! argument. It consults a [`RefStore`] for name lookups and a
//! [`git_odb::ObjectDatabase`] for prefix resolution and parent/peel walks.

use git_hash::ObjectId;
use git_object::Object;
use git_odb::ObjectDatabase;

use crate::error::RefError;
use crate::name::RefName;
use crate::store::RefStore;

/// Maximum number of tag-peel hops before giving up (guards against cycles).
const MAX_PEEL_DEPTH: usize = 512;

/// Resolve a revision expression to an object id.
///
/// Supports:
/// - full or abbreviated (>=4 hex digit) object ids
/// - ref names, tried as given, then under `refs/heads/`, `refs/tags/`,
///   `refs/remotes/`, and `refs/`
/// - `REV~N` (first-parent ancestor, N times)
/// - `REV^N` (Nth parent, `^0` is the commit itself)
/// - `REV^{type}` / `REV^{}` (peel annotated tags down to `type`, or to the
///   first non-tag object)
pub fn resolve_revision(odb: &ObjectDatabase, refs: &dyn RefStore, rev: &str) -> Result<ObjectId, RefError> {
    let rev = rev.trim();
    if rev.is_empty() {
        return Err(RefError::InvalidRevision("empty revision".into()));
    }

    if let Some((base, suffix)) = split_suffix(rev) {
        let base_oid = resolve_revision(odb, refs, base)?;
        return apply_suffix(odb, &base_oid, suffix);
    }

    if rev.len() >= 4 && rev.len() <= 64 && rev.chars().all(|c| c.is_ascii_hexdigit()) {
        if rev.len() == 40 || rev.len() == 64 {
            if let Ok(oid) = ObjectId::from_hex(rev) {
                return Ok(oid);
            }
        }
        if let Ok(oid) = odb.resolve_prefix(rev) {
            return Ok(oid);
        }
    }

    for candidate in ref_candidates(rev) {
        if let Ok(Some(oid)) = resolve_ref(refs, &candidate) {
            return Ok(oid);
        }
    }

    Err(RefError::InvalidRevision(format!("cannot resolve '{rev}'")))
}

fn ref_candidates(rev: &str) -> [String; 5] {
    [
        rev.to_string(),
        format!("refs/heads/{rev}"),
        format!("refs/tags/{rev}"),
        format!("refs/remotes/{rev}"),
        format!("refs/{rev}"),
    ]
}

fn resolve_ref(refs: &dyn RefStore, name: &str) -> Result<Option<ObjectId>, RefError> {
    match RefName::new(name) {
        Ok(name) => refs.resolve_to_oid(&name),
        Err(_) => Ok(None),
    }
}

/// Split trailing `~N`, `^N`, or `^{...}` off a revision string.
fn split_suffix(rev: &str) -> Option<(&str, &str)> {
    if let Some(brace_start) = rev.rfind("^{") {
        if rev.ends_with('}') && brace_start > 0 {
            return Some((&rev[..brace_start], &rev[brace_start..]));
        }
    }

    for (i, c) in rev.char_indices().rev() {
        if (c == '~' || c == '^') && i > 0 {
            let suffix = &rev[i..];
            let rest = &suffix[1..];
            if rest.is_empty() || rest.chars().all(|c| c.is_ascii_digit()) {
                return Some((&rev[..i], suffix));
            }
        }
    }
    None
}

fn apply_suffix(odb: &ObjectDatabase, oid: &ObjectId, suffix: &str) -> Result<ObjectId, RefError> {
    if let Some(target_type) = suffix.strip_prefix("^{").and_then(|s| s.strip_suffix('}')) {
        return peel_to_type(odb, oid, target_type);
    }

    let (op, count_str) = suffix.split_at(1);
    let count: usize = if count_str.is_empty() {
        1
    } else {
        count_str
            .parse()
            .map_err(|_| RefError::InvalidRevision(format!("invalid suffix: {suffix}")))?
    };

    match op {
        "~" => {
            let mut current = *oid;
            for _ in 0..count {
                let commit = read_commit(odb, &current)?;
                current = *commit.parents.first().ok_or_else(|| {
                    RefError::InvalidRevision(format!("{oid}~{count} goes past root"))
                })?;
            }
            Ok(current)
        }
        "^" => {
            if count == 0 {
                return Ok(*oid);
            }
            let commit = read_commit(odb, oid)?;
            commit
                .parents
                .get(count - 1)
                .copied()
                .ok_or_else(|| RefError::InvalidRevision(format!("{oid}^{count} has no such parent")))
        }
        _ => Err(RefError::InvalidRevision(format!("unknown suffix: {suffix}"))),
    }
}

/// Peel tags (and optionally commits, down to their tree) until `target_type`
/// is reached. `""` means "peel tags until the first non-tag object".
fn peel_to_type(odb: &ObjectDatabase, oid: &ObjectId, target_type: &str) -> Result<ObjectId, RefError> {
    let mut current = *oid;

    for _ in 0..MAX_PEEL_DEPTH {
        let obj = odb.read(&current)?.ok_or(RefError::NotFound(current.to_hex()))?;

        match (target_type, obj) {
            ("", Object::Tag(tag)) => {
                current = tag.target;
                continue;
            }
            ("", _) => return Ok(current),
            ("commit", Object::Commit(_)) => return Ok(current),
            ("commit", Object::Tag(tag)) => {
                current = tag.target;
                continue;
            }
            ("tree", Object::Tree(_)) => return Ok(current),
            ("tree", Object::Commit(c)) => return Ok(c.tree),
            ("tree", Object::Tag(tag)) => {
                current = tag.target;
                continue;
            }
            ("blob", Object::Blob(_)) => return Ok(current),
            ("blob", Object::Tag(tag)) => {
                current = tag.target;
                continue;
            }
            ("tag", Object::Tag(_)) => return Ok(current),
            (other, _) => {
                return Err(RefError::InvalidRevision(format!(
                    "{oid} cannot be peeled to {other}"
                )));
            }
        }
    }

    Err(RefError::InvalidRevision(format!("peeling {oid} exceeded depth limit")))
}

fn read_commit(odb: &ObjectDatabase, oid: &ObjectId) -> Result<git_object::Commit, RefError> {
    match odb.read(oid)?.ok_or(RefError::NotFound(oid.to_hex()))? {
        Object::Commit(c) => Ok(c),
        _ => Err(RefError::InvalidRevision(format!("{oid} is not a commit"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemRefStore;
    use git_object::{Commit, Tree};
    use git_utils::date::{GitDate, Signature};

    fn write_commit(odb: &ObjectDatabase, parents: Vec<ObjectId>) -> ObjectId {
        let who = Signature {
            name: "Test".into(),
            email: "t@example.com".into(),
            date: GitDate { timestamp: 1000, tz_offset: 0 },
        };
        let tree = odb.write(&Object::Tree(Tree::new())).unwrap();
        odb.write(&Object::Commit(Commit {
            tree,
            parents,
            author: who.clone(),
            committer: who,
            encoding: None,
            gpgsig: None,
            extra_headers: vec![],
            message: "msg".into(),
        }))
        .unwrap()
    }

    #[test]
    fn resolves_hex_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let odb = ObjectDatabase::open(dir.path()).unwrap();
        let refs = MemRefStore::new();
        let oid = write_commit(&odb, vec![]);
        let hex = oid.to_hex();
        assert_eq!(resolve_revision(&odb, &refs, &hex[..8]).unwrap(), oid);
    }

    #[test]
    fn resolves_branch_shorthand_and_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        let odb = ObjectDatabase::open(dir.path()).unwrap();
        let refs = MemRefStore::new();
        let root = write_commit(&odb, vec![]);
        let child = write_commit(&odb, vec![root]);
        refs.set_direct("refs/heads/main", child).unwrap();

        assert_eq!(resolve_revision(&odb, &refs, "main").unwrap(), child);
        assert_eq!(resolve_revision(&odb, &refs, "main~1").unwrap(), root);
        assert_eq!(resolve_revision(&odb, &refs, "main^1").unwrap(), root);
        assert_eq!(resolve_revision(&odb, &refs, "main^0").unwrap(), child);
    }
}
