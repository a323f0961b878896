//! "Theirs" merge strategy.
//!
//! Always produces a merge result that is identical to the incoming branch's
//! tree, ignoring our side entirely. Not to be confused with the `-X theirs`
//! recursive/ort strategy option, which still performs a real merge but
//! favors theirs on conflicting hunks.

use git_hash::ObjectId;
use git_object::Object;
use git_repository::Repository;

use crate::strategy::MergeStrategy;
use crate::{MergeError, MergeOptions, MergeResult};

/// The "theirs" strategy — always take their tree.
pub struct TheirsStrategy;

impl MergeStrategy for TheirsStrategy {
    fn merge(
        &self,
        repo: &mut Repository,
        _ours_commit: &ObjectId,
        theirs_commit: &ObjectId,
        _base_commit: &ObjectId,
        _options: &MergeOptions,
    ) -> Result<MergeResult, MergeError> {
        let odb = repo.odb();

        let obj = odb
            .read(theirs_commit)?
            .ok_or(MergeError::ObjectNotFound(*theirs_commit))?;

        let tree_oid = match obj {
            Object::Commit(c) => c.tree,
            other => {
                return Err(MergeError::UnexpectedObjectType {
                    oid: *theirs_commit,
                    expected: "commit",
                    actual: other.object_type().to_string(),
                })
            }
        };

        Ok(MergeResult::clean(tree_oid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theirs_strategy_type() {
        let _strategy = TheirsStrategy;
    }
}
