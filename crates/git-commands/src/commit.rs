//! `CommitCommand`: records the current index (or a derived subset of it)
//! as a new commit and advances the current branch.

use bstr::BString;
use git_hash::ObjectId;
use git_index::{Index, Stage};
use git_object::{Commit, Object, ObjectType};
use git_ref::{RefName, RefStore, RefTransaction};
use git_repository::Repository;
use git_utils::date::Signature;

use crate::worktree::Worktree;
use crate::{effective_author, CommandError};

/// Builds and records a single commit.
///
/// ```ignore
/// CommitCommand::new(&mut repo)
///     .message("Initial")
///     .allow_empty(true)
///     .call()?;
/// ```
pub struct CommitCommand<'r> {
    repo: &'r mut Repository,
    called: bool,
    message: Option<String>,
    author: Option<Signature>,
    committer: Option<Signature>,
    allow_empty: bool,
    amend: bool,
    only: Option<Vec<BString>>,
    all: bool,
}

impl<'r> CommitCommand<'r> {
    pub fn new(repo: &'r mut Repository) -> Self {
        Self {
            repo,
            called: false,
            message: None,
            author: None,
            committer: None,
            allow_empty: false,
            amend: false,
            only: None,
            all: false,
        }
    }

    fn check_not_called(&self) -> Result<(), CommandError> {
        if self.called {
            Err(CommandError::AlreadyCalled)
        } else {
            Ok(())
        }
    }

    pub fn message(&mut self, msg: impl Into<String>) -> &mut Self {
        self.message = Some(msg.into());
        self
    }

    pub fn author(&mut self, sig: Signature) -> &mut Self {
        self.author = Some(sig);
        self
    }

    pub fn committer(&mut self, sig: Signature) -> &mut Self {
        self.committer = Some(sig);
        self
    }

    pub fn allow_empty(&mut self, allow: bool) -> &mut Self {
        self.allow_empty = allow;
        self
    }

    pub fn amend(&mut self, amend: bool) -> &mut Self {
        self.amend = amend;
        self
    }

    /// Restrict the commit to these paths: the resulting tree is derived
    /// from HEAD with only these paths replaced by current index content.
    /// Mutually exclusive with `all`.
    pub fn only(&mut self, path: impl Into<BString>) -> &mut Self {
        self.only.get_or_insert_with(Vec::new).push(path.into());
        self
    }

    /// Auto-stage modifications/deletions of tracked files before
    /// committing. Mutually exclusive with `only`.
    pub fn all(&mut self, all: bool) -> &mut Self {
        self.all = all;
        self
    }

    /// Perform the commit. Consumes the builder's validity: any further
    /// setter or `call()` returns `AlreadyCalled`.
    pub fn call(&mut self) -> Result<ObjectId, CommandError> {
        self.check_not_called()?;
        self.called = true;

        let message = self.message.clone().ok_or(CommandError::NoMessage)?;
        if message.trim().is_empty() {
            return Err(CommandError::NoMessage);
        }

        if self.only.is_some() && self.all {
            return Err(CommandError::InvalidMergeHeads(
                "--only and --all are mutually exclusive".into(),
            ));
        }

        let head_oid = self.repo.head_oid()?;
        let parent_commit = match head_oid {
            Some(oid) => Some(read_commit(self.repo, &oid)?),
            None => None,
        };

        if self.all {
            stage_tracked_modifications(self.repo)?;
        }

        let tree_id = if let Some(ref paths) = self.only {
            let base_tree = parent_commit.as_ref().map(|c| c.tree);
            build_only_tree(self.repo, base_tree, paths)?
        } else {
            let index = self.repo.index()?;
            index.write_tree(self.repo.odb())?
        };

        let parents: Vec<ObjectId> = if self.amend {
            parent_commit.as_ref().map(|c| c.parents.clone()).unwrap_or_default()
        } else {
            head_oid.into_iter().collect()
        };

        if !self.allow_empty {
            let unchanged = match (&parent_commit, self.amend) {
                (Some(parent), false) => parent.tree == tree_id,
                (Some(parent), true) => {
                    // Amending: compare against the grandparent's tree, i.e.
                    // whether the amended commit would be a no-op relative
                    // to its own (unchanged) parents.
                    match parent.parents.first() {
                        Some(grandparent) => read_commit(self.repo, grandparent)?.tree == tree_id,
                        None => tree_id == empty_tree(self.repo)?,
                    }
                }
                (None, _) => tree_id == empty_tree(self.repo)?,
            };
            if unchanged {
                return Err(CommandError::EmptyCommit);
            }
        }

        let author = if self.amend {
            self.author
                .clone()
                .or_else(|| parent_commit.as_ref().map(|c| c.author.clone()))
                .unwrap_or_else(|| effective_author(self.repo, None))
        } else {
            effective_author(self.repo, self.author.clone())
        };
        let committer = self
            .committer
            .clone()
            .unwrap_or_else(|| author.clone());

        let commit = Commit {
            tree: tree_id,
            parents,
            author,
            committer,
            encoding: None,
            gpgsig: None,
            extra_headers: Vec::new(),
            message: BString::from(message),
        };

        let commit_oid = self.repo.odb().write(&Object::Commit(commit))?;

        advance_current_branch(self.repo, commit_oid)?;

        Ok(commit_oid)
    }
}

fn read_commit(repo: &Repository, oid: &ObjectId) -> Result<Commit, CommandError> {
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

fn empty_tree(repo: &Repository) -> Result<ObjectId, CommandError> {
    Ok(repo.odb().write_raw(ObjectType::Tree, b"")?)
}

/// Build a tree derived from `base_tree` (or the empty tree) with `paths`
/// replaced by whatever the current index holds for them.
fn build_only_tree(
    repo: &mut Repository,
    base_tree: Option<ObjectId>,
    paths: &[BString],
) -> Result<ObjectId, CommandError> {
    let staged_entries: Vec<_> = {
        let staged = repo.index()?;
        paths
            .iter()
            .filter_map(|path| staged.get(path.as_ref(), Stage::Normal).cloned())
            .collect()
    };

    let odb = repo.odb();
    let mut working = match base_tree {
        Some(t) => Index::read_tree(odb, &t)?,
        None => Index::new(),
    };

    for path in paths {
        working.remove(path.as_ref(), Stage::Normal);
    }
    for entry in staged_entries {
        working.add(entry);
    }

    Ok(working.write_tree(odb)?)
}

/// Stage modifications and deletions of already-tracked files from the
/// working tree (new untracked files are left alone, matching `--all`'s
/// documented behavior).
fn stage_tracked_modifications(repo: &mut Repository) -> Result<(), CommandError> {
    let work_tree = match repo.work_tree() {
        Some(p) => p.to_path_buf(),
        None => return Ok(()),
    };
    let wt = crate::worktree::FsWorktree::new(&work_tree);

    let tracked: Vec<_> = repo
        .index()?
        .iter()
        .filter(|e| e.stage == Stage::Normal)
        .map(|e| e.path.clone())
        .collect();

    let (odb, index) = repo.odb_and_index_mut()?;
    for path in tracked {
        let path_ref = bstr::BStr::new(&path);
        if wt.exists(path_ref) {
            let content = wt.read_content(path_ref).map_err(|_| {
                CommandError::CorruptObject(format!("unreadable working tree file: {path}"))
            })?;
            let oid = odb.write_raw(ObjectType::Blob, &content)?;
            if let Some(entry) = index.get(path_ref, Stage::Normal) {
                if entry.oid != oid {
                    let mut updated = entry.clone();
                    updated.oid = oid;
                    index.add(updated);
                }
            }
        } else {
            index.remove(path_ref, Stage::Normal);
        }
    }

    Ok(())
}

fn advance_current_branch(repo: &mut Repository, commit_oid: ObjectId) -> Result<(), CommandError> {
    let head_ref = RefName::new("HEAD")?;
    match repo.refs().resolve(&head_ref)? {
        Some(git_ref::Reference::Symbolic { target, .. }) => {
            let old = repo.refs().resolve_to_oid(&target)?;
            let mut txn = RefTransaction::new();
            match old {
                Some(old_oid) => txn.update(target, old_oid, commit_oid, "commit"),
                None => txn.create(target, commit_oid, "commit (initial)"),
            }
            repo.refs().commit_transaction(txn)?;
        }
        _ => {
            // Detached HEAD or unborn without a symbolic target recorded —
            // create the default branch and point HEAD at it.
            let branch = RefName::new("refs/heads/main")?;
            repo.refs().write_ref(&branch, &commit_oid)?;
            repo.refs().write_symbolic_ref(&head_ref, &branch)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn initial_empty_commit() {
        let (_dir, mut repo) = init_repo();
        let oid = CommitCommand::new(&mut repo)
            .message("Initial")
            .allow_empty(true)
            .call()
            .unwrap();

        let commit = read_commit(&repo, &oid).unwrap();
        assert!(commit.parents.is_empty());
        assert_eq!(commit.message, "Initial");

        let head = repo.head_oid().unwrap().unwrap();
        assert_eq!(head, oid);
    }

    #[test]
    fn refuses_empty_message() {
        let (_dir, mut repo) = init_repo();
        let err = CommitCommand::new(&mut repo)
            .message("")
            .allow_empty(true)
            .call()
            .unwrap_err();
        assert!(matches!(err, CommandError::NoMessage));
    }

    #[test]
    fn refuses_reuse_after_call() {
        let (_dir, mut repo) = init_repo();
        let mut cmd = CommitCommand::new(&mut repo);
        cmd.message("first").allow_empty(true);
        cmd.call().unwrap();
        let err = cmd.call().unwrap_err();
        assert!(matches!(err, CommandError::AlreadyCalled));
    }

    #[test]
    fn refuses_empty_commit_without_allow() {
        let (_dir, mut repo) = init_repo();
        CommitCommand::new(&mut repo)
            .message("first")
            .allow_empty(true)
            .call()
            .unwrap();

        // Second commit with no index changes and no allow_empty.
        let err = CommitCommand::new(&mut repo)
            .message("second")
            .call()
            .unwrap_err();
        assert!(matches!(err, CommandError::EmptyCommit));
    }
}
