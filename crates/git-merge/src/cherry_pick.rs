//! Cherry-pick implementation.
//!
//! Applies a single commit's changes onto the current branch by treating
//! the commit's parent as the merge base and performing a three-way merge.

use git_hash::ObjectId;
use git_object::Object;
use git_repository::Repository;

use crate::strategy::dispatch_merge;
use crate::{MergeError, MergeOptions, MergeResult};

/// Cherry-pick a commit onto the current branch.
///
/// Uses the commit's first parent as the merge base and the commit itself
/// as "theirs", performing a three-way merge against the current HEAD.
///
/// `mainline` is the 1-based parent number to treat as the base when
/// `commit_oid` is a merge commit (mirrors `git cherry-pick -m`). `None` is
/// only valid for single-parent commits; a merge commit with `mainline: None`
/// is an error the caller (`CherryPickCommand`) translates to
/// `MultipleParentsNotAllowed`.
pub fn cherry_pick(
    repo: &mut Repository,
    commit_oid: &ObjectId,
    mainline: Option<usize>,
    options: &MergeOptions,
) -> Result<MergeResult, MergeError> {
    let odb = repo.odb();

    // Read the commit to cherry-pick.
    let obj = odb
        .read(commit_oid)?
        .ok_or(MergeError::ObjectNotFound(*commit_oid))?;

    let commit = match obj {
        Object::Commit(c) => c,
        other => {
            return Err(MergeError::UnexpectedObjectType {
                oid: *commit_oid,
                expected: "commit",
                actual: other.object_type().to_string(),
            })
        }
    };

    // The merge base is the selected parent (mainline if given, otherwise
    // the sole parent of a non-merge commit).
    let base = match mainline {
        Some(n) => commit
            .parents
            .get(n.saturating_sub(1))
            .ok_or(MergeError::NoMergeBase)?,
        None => commit
            .parents
            .first()
            .ok_or(MergeError::NoMergeBase)?,
    };

    // "Ours" is the current HEAD.
    let head_oid = repo
        .head_oid()?
        .ok_or(MergeError::NoMergeBase)?;

    // Perform the merge: base=parent, ours=HEAD, theirs=commit
    let mut result = dispatch_merge(repo, &head_oid, commit_oid, base, options)?;

    // Set the commit message from the cherry-picked commit.
    result.message = Some(commit.message.to_string());

    Ok(result)
}
