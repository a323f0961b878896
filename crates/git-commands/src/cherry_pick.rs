//! `CherryPickCommand`: replays a commit's changes onto the current branch.

use git_hash::ObjectId;
use git_merge::{ConflictEntry, MergeOptions};
use git_object::Object;
use git_ref::{RefName, RefStore, RefTransaction};
use git_repository::Repository;
use git_revwalk::resolve_revision;

use crate::{effective_author, CommandError};

/// Outcome of a single cherry-pick.
#[derive(Debug, Clone)]
pub enum CherryPickOutcome {
    /// Clean apply, new commit recorded (unless `no_commit`).
    Applied { commit: Option<ObjectId> },
    /// Apply produced conflicts; HEAD is unchanged and the index holds
    /// the conflict stages.
    Conflicting { conflicts: Vec<ConflictEntry> },
}

/// Builds and runs a cherry-pick of a single commit.
pub struct CherryPickCommand<'r> {
    repo: &'r mut Repository,
    called: bool,
    commit: Option<String>,
    mainline: Option<usize>,
    no_commit: bool,
    options: MergeOptions,
}

impl<'r> CherryPickCommand<'r> {
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

    /// The commit-ish to cherry-pick (rev-parse syntax).
    pub fn include(&mut self, rev: impl Into<String>) -> &mut Self {
        self.commit = Some(rev.into());
        self
    }

    /// 1-based parent number to use as the base when the picked commit is
    /// a merge (mirrors `git cherry-pick -m`).
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

    pub fn call(&mut self) -> Result<CherryPickOutcome, CommandError> {
        self.check_not_called()?;
        self.called = true;

        let rev = self
            .commit
            .clone()
            .ok_or_else(|| CommandError::InvalidMergeHeads("no commit given to cherry-pick".into()))?;
        let commit_oid = resolve_revision(self.repo, &rev)?;

        let picked = read_commit(self.repo, &commit_oid)?;
        if picked.parents.len() > 1 && self.mainline.is_none() {
            return Err(CommandError::MultipleParentsNotAllowed);
        }

        let result = git_merge::cherry_pick::cherry_pick(
            self.repo,
            &commit_oid,
            self.mainline,
            &self.options,
        )?;

        if !result.is_clean {
            let index = self.repo.index_mut()?;
            for conflict in &result.conflicts {
                git_merge::conflict::record_conflict_in_index(index, conflict);
            }
            self.repo.write_index()?;
            return Ok(CherryPickOutcome::Conflicting {
                conflicts: result.conflicts,
            });
        }

        let tree_oid = result.tree.expect("clean merge result always has a tree");
        let new_index = git_index::Index::read_tree(self.repo.odb(), &tree_oid)?;
        self.repo.set_index(new_index);
        self.repo.write_index()?;

        if self.no_commit {
            return Ok(CherryPickOutcome::Applied { commit: None });
        }

        let head_oid = self
            .repo
            .head_oid()?
            .ok_or_else(|| CommandError::RefNotFound("HEAD".into()))?;
        let message = result.message.unwrap_or_else(|| picked.message.to_string());

        let commit_oid_new = write_commit(
            self.repo,
            tree_oid,
            vec![head_oid],
            picked.author.clone(),
            message,
        )?;
        advance_current_branch(self.repo, commit_oid_new)?;

        Ok(CherryPickOutcome::Applied {
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
    let committer = effective_author(repo, None);
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
                Some(old_oid) => txn.update(target, old_oid, commit_oid, "cherry-pick"),
                None => txn.create(target, commit_oid, "cherry-pick (initial)"),
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
    fn cherry_pick_clean_commit() {
        let (_dir, mut repo) = init_repo();
        commit_with_file(&mut repo, "a.txt", b"one", "first");
        crate::checkout::CheckoutCommand::new(&mut repo)
            .create_branch("feature")
            .call()
            .unwrap();
        let picked = commit_with_file(&mut repo, "b.txt", b"two", "add b");

        crate::checkout::CheckoutCommand::new(&mut repo)
            .branch("main")
            .call()
            .unwrap();

        let outcome = CherryPickCommand::new(&mut repo)
            .include(picked.to_string())
            .call()
            .unwrap();
        match outcome {
            CherryPickOutcome::Applied { commit } => assert!(commit.is_some()),
            CherryPickOutcome::Conflicting { .. } => panic!("expected clean cherry-pick"),
        }
    }

    #[test]
    fn merge_commit_requires_mainline() {
        let (_dir, mut repo) = init_repo();
        let base = commit_with_file(&mut repo, "a.txt", b"one", "first");
        crate::checkout::CheckoutCommand::new(&mut repo)
            .create_branch("feature")
            .call()
            .unwrap();
        let side = commit_with_file(&mut repo, "b.txt", b"two", "side");

        crate::checkout::CheckoutCommand::new(&mut repo)
            .branch("main")
            .call()
            .unwrap();
        let merge_outcome = crate::merge::MergeCommand::new(&mut repo)
            .include(side.to_string())
            .call()
            .unwrap();
        let merge_commit = merge_outcome.new_head.unwrap();
        assert_ne!(merge_commit, base);

        let err = CherryPickCommand::new(&mut repo)
            .include(merge_commit.to_string())
            .call()
            .unwrap_err();
        assert!(matches!(err, CommandError::MultipleParentsNotAllowed));
    }

    #[test]
    fn refuses_reuse_after_call() {
        let (_dir, mut repo) = init_repo();
        let first = commit_with_file(&mut repo, "a.txt", b"one", "first");
        let mut cmd = CherryPickCommand::new(&mut repo);
        cmd.include(first.to_string());
        let _ = cmd.call();
        let err = cmd.call().unwrap_err();
        assert!(matches!(err, CommandError::AlreadyCalled));
    }
}
