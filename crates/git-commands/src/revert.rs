//! `RevertCommand`: applies the inverse of a commit onto the current branch.

use git_hash::ObjectId;
use git_merge::{ConflictEntry, MergeOptions};
use git_object::Object;
use git_ref::{RefName, RefStore, RefTransaction};
use git_repository::Repository;
use git_revwalk::resolve_revision;

use crate::{effective_author, CommandError};

/// Outcome of a single revert.
#[derive(Debug, Clone)]
pub enum RevertOutcome {
    /// Clean apply, new commit recorded (unless `no_commit`).
    Applied { commit: Option<ObjectId> },
    /// Apply produced conflicts; HEAD is unchanged and the index holds
    /// the conflict stages.
    Conflicting { conflicts: Vec<ConflictEntry> },
}

/// Builds and runs a revert of a single commit.
pub struct RevertCommand<'r> {
    repo: &'r mut Repository,
    called: bool,
    commit: Option<String>,
    mainline: Option<usize>,
    no_commit: bool,
    options: MergeOptions,
}

impl<'r> RevertCommand<'r> {
    pub fn new(repo: &'r mut Repository) -> Self {
        Self {
            repo,
            called: false,
            commit: None,
            mainline: None,
            no_commit: false,
            options: MergeOptions::default(),
        }
    }

    fn check_not_called(&self) -> Result<(), CommandError> {
        if self.called {
            Err(CommandError::AlreadyCalled)
        } else {
            Ok(())
        }
    }

    /// The commit-ish to revert (rev-parse syntax).
    pub fn include(&mut self, rev: impl Into<String>) -> &mut Self {
        self.commit = Some(rev.into());
        self
    }

    /// 1-based parent number to revert to when the commit is a merge
    /// (mirrors `git revert -m`).
    pub fn mainline_parent_number(&mut self, n: usize) -> &mut Self {
        self.mainline = Some(n);
        self
    }

    /// Write the merge result into the index without creating a commit;
    /// HEAD stays where it was.
    pub fn no_commit(&mut self, no_commit: bool) -> &mut Self {
        self.no_commit = no_commit;
        self
    }

    pub fn strategy(&mut self, options: MergeOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn call(&mut self) -> Result<RevertOutcome, CommandError> {
        self.check_not_called()?;
        self.called = true;

        let rev = self
            .commit
            .clone()
            .ok_or_else(|| CommandError::InvalidMergeHeads("no commit given to revert".into()))?;
        let commit_oid = resolve_revision(self.repo, &rev)?;

        let reverted = read_commit(self.repo, &commit_oid)?;
        if reverted.parents.len() > 1 && self.mainline.is_none() {
            return Err(CommandError::MultipleParentsNotAllowed);
        }

        let result =
            git_merge::revert::revert(self.repo, &commit_oid, self.mainline, &self.options)?;

        if !result.is_clean {
            let index = self.repo.index_mut()?;
            for conflict in &result.conflicts {
                git_merge::conflict::record_conflict_in_index(index, conflict);
            }
            self.repo.write_index()?;
            return Ok(RevertOutcome::Conflicting {
                conflicts: result.conflicts,
            });
        }

        let tree_oid = result.tree.expect("clean merge result always has a tree");
        let new_index = git_index::Index::read_tree(self.repo.odb(), &tree_oid)?;
        self.repo.set_index(new_index);
        self.repo.write_index()?;

        if self.no_commit {
            return Ok(RevertOutcome::Applied { commit: None });
        }

        let head_oid = self
            .repo
            .head_oid()?
            .ok_or_else(|| CommandError::RefNotFound("HEAD".into()))?;
        let message = result.message.expect("revert always sets a message");
        let author = effective_author(self.repo, None);

        let commit_oid_new = write_commit(self.repo, tree_oid, vec![head_oid], author, message)?;
        advance_current_branch(self.repo, commit_oid_new)?;

        Ok(RevertOutcome::Applied {
            commit: Some(commit_oid_new),
        })
    }
}

fn read_commit(repo: &Repository, oid: &ObjectId) -> Result<git_object::Commit, CommandError> {
    let obj = repo
        .odb()
        .read(oid)?
        .ok_or_else(|| CommandError::CorruptObject(format!("missing commit {oid}")))?;
    match obj {
        Object::Commit(c) => Ok(c),
        other => Err(CommandError::CorruptObject(format!(
            "expected commit, got {}",
            other.object_type()
        ))),
    }
}

fn write_commit(
    repo: &mut Repository,
    tree: ObjectId,
    parents: Vec<ObjectId>,
    author: git_utils::date::Signature,
    message: String,
) -> Result<ObjectId, CommandError> {
    use git_object::Commit;
    let committer = author.clone();
    let commit = Commit {
        tree,
        parents,
        author,
        committer,
        encoding: None,
        gpgsig: None,
        extra_headers: Vec::new(),
        message: bstr::BString::from(message),
    };
    Ok(repo.odb().write(&Object::Commit(commit))?)
}

fn advance_current_branch(repo: &mut Repository, commit_oid: ObjectId) -> Result<(), CommandError> {
    let head_ref = RefName::new("HEAD")?;
    match repo.refs().resolve(&head_ref)? {
        Some(git_ref::Reference::Symbolic { target, .. }) => {
            let old = repo.refs().resolve_to_oid(&target)?;
            let mut txn = RefTransaction::new();
            match old {
                Some(old_oid) => txn.update(target, old_oid, commit_oid, "revert"),
                None => txn.create(target, commit_oid, "revert (initial)"),
            }
            repo.refs().commit_transaction(txn)?;
        }
        _ => {
            repo.refs().write_ref(&head_ref, &commit_oid)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::CommitCommand;
    use bstr::BString;
    use git_index::{IndexEntry, Stage};
    use git_object::{FileMode, ObjectType};

    fn init_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn commit_with_file(repo: &mut Repository, name: &str, content: &[u8], msg: &str) -> ObjectId {
        let blob = repo.odb().write_raw(ObjectType::Blob, content).unwrap();
        repo.index_mut().unwrap().add(IndexEntry {
            path: BString::from(name),
            oid: blob,
            mode: FileMode::Regular,
            stage: Stage::Normal,
            stat: Default::default(),
            flags: Default::default(),
        });
        CommitCommand::new(repo).message(msg).call().unwrap()
    }

    #[test]
    fn revert_message_format() {
        let (_dir, mut repo) = init_repo();
        commit_with_file(&mut repo, "a.txt", b"one", "first");
        let to_revert = commit_with_file(&mut repo, "a.txt", b"two", "Fix the bug\n\nDetails");

        let outcome = RevertCommand::new(&mut repo)
            .include(to_revert.to_string())
            .call()
            .unwrap();

        let new_commit = match outcome {
            RevertOutcome::Applied { commit: Some(c) } => c,
            _ => panic!("expected clean revert"),
        };

        let commit = read_commit(&repo, &new_commit).unwrap();
        assert!(commit.message.starts_with("Revert \"Fix the bug\""));
        assert!(commit
            .message
            .to_string()
            .contains(&format!("This reverts commit {to_revert}.")));
    }

    #[test]
    fn refuses_reuse_after_call() {
        let (_dir, mut repo) = init_repo();
        let first = commit_with_file(&mut repo, "a.txt", b"one", "first");
        let mut cmd = RevertCommand::new(&mut repo);
        cmd.include(first.to_string());
        let _ = cmd.call();
        let err = cmd.call().unwrap_err();
        assert!(matches!(err, CommandError::AlreadyCalled));
    }
}
