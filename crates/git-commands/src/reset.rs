//! `ResetCommand`: moves HEAD (and optionally the index/working tree) to a
//! target commit.

use git_hash::ObjectId;
use git_index::Index;
use git_object::Object;
use git_ref::{RefName, RefStore, RefTransaction, Reference};
use git_repository::Repository;
use git_revwalk::resolve_revision;

use crate::worktree::Worktree;
use crate::CommandError;

/// How much of the repository state a reset touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetMode {
    /// Move HEAD (and the current branch) only; index and worktree untouched.
    Soft,
    /// Move HEAD and reset the index to the target's tree. Default.
    #[default]
    Mixed,
    /// Move HEAD, reset the index, and overwrite the working tree.
    Hard,
}

/// Moves the current branch (and, depending on mode, the index/worktree)
/// to a target revision.
pub struct ResetCommand<'r> {
    repo: &'r mut Repository,
    called: bool,
    target: Option<String>,
    mode: ResetMode,
}

impl<'r> ResetCommand<'r> {
    pub fn new(repo: &'r mut Repository) -> Self {
        Self {
            repo,
            called: false,
            target: None,
            mode: ResetMode::Mixed,
        }
    }

    fn check_not_called(&self) -> Result<(), CommandError> {
        if self.called {
            Err(CommandError::AlreadyCalled)
        } else {
            Ok(())
        }
    }

    /// Target revision, rev-parse syntax. Defaults to HEAD.
    pub fn target(&mut self, rev: impl Into<String>) -> &mut Self {
        self.target = Some(rev.into());
        self
    }

    pub fn mode(&mut self, mode: ResetMode) -> &mut Self {
        self.mode = mode;
        self
    }

    pub fn call(&mut self) -> Result<ObjectId, CommandError> {
        self.check_not_called()?;
        self.called = true;

        let target_rev = self.target.clone().unwrap_or_else(|| "HEAD".to_string());
        let target_oid = resolve_revision(self.repo, &target_rev)?;

        let tree_oid = match self.repo.odb().read(&target_oid)? {
            Some(Object::Commit(c)) => c.tree,
            Some(Object::Tree(_)) => target_oid,
            Some(other) => {
                return Err(CommandError::CorruptObject(format!(
                    "expected commit or tree, got {}",
                    other.object_type()
                )))
            }
            None => {
                return Err(CommandError::CorruptObject(format!(
                    "missing object {target_oid}"
                )))
            }
        };

        move_head(self.repo, target_oid)?;

        if self.mode != ResetMode::Soft {
            let new_index = Index::read_tree(self.repo.odb(), &tree_oid)?;
            self.repo.set_index(new_index);
            self.repo.write_index()?;
        }

        if self.mode == ResetMode::Hard {
            if let Some(work_tree) = self.repo.work_tree() {
                let wt = crate::worktree::FsWorktree::new(work_tree);
                wt.checkout_tree(self.repo.odb(), &tree_oid)?;
            }
        }

        Ok(target_oid)
    }
}

fn move_head(repo: &mut Repository, target: ObjectId) -> Result<(), CommandError> {
    let head_ref = RefName::new("HEAD")?;
    match repo.refs().resolve(&head_ref)? {
        Some(Reference::Symbolic { target: branch, .. }) => {
            let old = repo.refs().resolve_to_oid(&branch)?;
            let mut txn = RefTransaction::new();
            match old {
                Some(old_oid) => txn.update(branch, old_oid, target, "reset"),
                None => txn.create(branch, target, "reset"),
            }
            repo.refs().commit_transaction(txn)?;
        }
        _ => {
            // Detached HEAD: overwrite the direct ref.
            repo.refs().write_ref(&head_ref, &target)?;
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
        let entry = IndexEntry {
            path: BString::from(name),
            oid: blob,
            mode: FileMode::Regular,
            stage: Stage::Normal,
            stat: Default::default(),
            flags: Default::default(),
        };
        repo.index_mut().unwrap().add(entry);
        CommitCommand::new(repo).message(msg).call().unwrap()
    }

    #[test]
    fn soft_reset_moves_head_only() {
        let (_dir, mut repo) = init_repo();
        let first = commit_with_file(&mut repo, "a.txt", b"one", "first");
        commit_with_file(&mut repo, "b.txt", b"two", "second");

        ResetCommand::new(&mut repo)
            .target(first.to_string())
            .mode(ResetMode::Soft)
            .call()
            .unwrap();

        assert_eq!(repo.head_oid().unwrap().unwrap(), first);
        // Index retains the second commit's staged content (soft reset
        // leaves it untouched).
        assert!(repo
            .index_mut()
            .unwrap()
            .get(bstr::BStr::new(b"b.txt"), Stage::Normal)
            .is_some());
    }

    #[test]
    fn mixed_reset_resets_index() {
        let (_dir, mut repo) = init_repo();
        let first = commit_with_file(&mut repo, "a.txt", b"one", "first");
        commit_with_file(&mut repo, "b.txt", b"two", "second");

        ResetCommand::new(&mut repo)
            .target(first.to_string())
            .mode(ResetMode::Mixed)
            .call()
            .unwrap();

        assert_eq!(repo.head_oid().unwrap().unwrap(), first);
        assert!(repo
            .index_mut()
            .unwrap()
            .get(bstr::BStr::new(b"b.txt"), Stage::Normal)
            .is_none());
    }

    #[test]
    fn refuses_reuse_after_call() {
        let (_dir, mut repo) = init_repo();
        commit_with_file(&mut repo, "a.txt", b"one", "first");
        let mut cmd = ResetCommand::new(&mut repo);
        cmd.call().unwrap();
        let err = cmd.call().unwrap_err();
        assert!(matches!(err, CommandError::AlreadyCalled));
    }
}
