//! `MergeCommand`: three-way merges another commit into the current branch.

use git_diff::{is_ancestor, merge_base_many};
use git_hash::ObjectId;
use git_merge::strategy::dispatch_merge;
use git_merge::{ConflictEntry, MergeOptions};
use git_ref::{RefName, RefStore, RefTransaction};
use git_repository::Repository;
use git_revwalk::resolve_revision;

use crate::{effective_author, CommandError};

/// Outcome status of a merge, distinguishing fast-forwards and squashes from
/// ordinary two-parent merge commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    AlreadyUpToDate,
    FastForward,
    FastForwardSquashed,
    Merged,
    MergedSquashed,
    MergedNotCommitted,
    Conflicting,
}

/// Result of running a `MergeCommand`.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub status: MergeStatus,
    pub new_head: Option<ObjectId>,
    pub conflicts: Vec<ConflictEntry>,
}

/// Merge strategy selection exposed at the command layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastForwardMode {
    /// Fast-forward when possible, merge commit otherwise (default).
    Auto,
    /// Refuse anything but a fast-forward.
    Only,
    /// Never fast-forward; always create a merge commit.
    Never,
}

/// Builds and runs a merge of another commit-ish into HEAD.
pub struct MergeCommand<'r> {
    repo: &'r mut Repository,
    called: bool,
    theirs: Option<String>,
    message: Option<String>,
    ff_mode: FastForwardMode,
    squash: bool,
    options: MergeOptions,
}

impl<'r> MergeCommand<'r> {
    pub fn new(repo: &'r mut Repository) -> Self {
        Self {
            repo,
            called: false,
            theirs: None,
            message: None,
            ff_mode: FastForwardMode::Auto,
            squash: false,
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

    /// The commit-ish to merge into HEAD (rev-parse syntax).
    pub fn include(&mut self, rev: impl Into<String>) -> &mut Self {
        self.theirs = Some(rev.into());
        self
    }

    pub fn message(&mut self, msg: impl Into<String>) -> &mut Self {
        self.message = Some(msg.into());
        self
    }

    pub fn fast_forward(&mut self, mode: FastForwardMode) -> &mut Self {
        self.ff_mode = mode;
        self
    }

    /// Write the merged tree into the index without creating a commit or
    /// moving the branch ref.
    pub fn squash(&mut self, squash: bool) -> &mut Self {
        self.squash = squash;
        self
    }

    pub fn strategy(&mut self, options: MergeOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn call(&mut self) -> Result<MergeOutcome, CommandError> {
        self.check_not_called()?;
        self.called = true;

        let theirs_rev = self
            .theirs
            .clone()
            .ok_or_else(|| CommandError::InvalidMergeHeads("no commit given to merge".into()))?;
        let theirs_oid = resolve_revision(self.repo, &theirs_rev)?;

        let ours_oid = self
            .repo
            .head_oid()?
            .ok_or_else(|| CommandError::RefNotFound("HEAD".into()))?;

        if ours_oid == theirs_oid {
            return Ok(MergeOutcome {
                status: MergeStatus::AlreadyUpToDate,
                new_head: Some(ours_oid),
                conflicts: Vec::new(),
            });
        }

        // Already up to date: theirs is an ancestor of ours.
        if is_ancestor(self.repo, &theirs_oid, &ours_oid)? {
            return Ok(MergeOutcome {
                status: MergeStatus::AlreadyUpToDate,
                new_head: Some(ours_oid),
                conflicts: Vec::new(),
            });
        }

        // Fast-forward: ours is an ancestor of theirs.
        if is_ancestor(self.repo, &ours_oid, &theirs_oid)? && self.ff_mode != FastForwardMode::Never {
            let theirs_tree = commit_tree(self.repo, &theirs_oid)?;
            let new_index = git_index::Index::read_tree(self.repo.odb(), &theirs_tree)?;
            self.repo.set_index(new_index);
            self.repo.write_index()?;

            if self.squash {
                // Squash never advances the ref, fast-forward or not.
                return Ok(MergeOutcome {
                    status: MergeStatus::FastForwardSquashed,
                    new_head: None,
                    conflicts: Vec::new(),
                });
            }

            advance_current_branch(self.repo, theirs_oid)?;
            return Ok(MergeOutcome {
                status: MergeStatus::FastForward,
                new_head: Some(theirs_oid),
                conflicts: Vec::new(),
            });
        }

        if self.ff_mode == FastForwardMode::Only {
            return Err(CommandError::NotFastForward);
        }

        let bases = merge_base_many(self.repo, &[ours_oid, theirs_oid])?;
        if bases.is_empty() && !self.options.allow_unrelated_histories {
            return Err(CommandError::Merge(git_merge::MergeError::UnrelatedHistories));
        }
        let base_oid = virtual_base(self.repo, &bases, &self.options)?;

        let result = dispatch_merge(self.repo, &ours_oid, &theirs_oid, &base_oid, &self.options)?;

        if !result.is_clean {
            let index = self.repo.index_mut()?;
            for conflict in &result.conflicts {
                git_merge::conflict::record_conflict_in_index(index, conflict);
            }
            self.repo.write_index()?;
            return Ok(MergeOutcome {
                status: MergeStatus::Conflicting,
                new_head: None,
                conflicts: result.conflicts,
            });
        }

        let tree_oid = result.tree.expect("clean merge result always has a tree");
        let new_index = git_index::Index::read_tree(self.repo.odb(), &tree_oid)?;
        self.repo.set_index(new_index);
        self.repo.write_index()?;

        if self.squash {
            return Ok(MergeOutcome {
                status: MergeStatus::MergedSquashed,
                new_head: None,
                conflicts: Vec::new(),
            });
        }

        let merge_commit_oid =
            write_merge_commit(self.repo, tree_oid, ours_oid, theirs_oid, self.message.clone())?;
        advance_current_branch(self.repo, merge_commit_oid)?;

        Ok(MergeOutcome {
            status: MergeStatus::Merged,
            new_head: Some(merge_commit_oid),
            conflicts: Vec::new(),
        })
    }
}

/// Collapse multiple recursive-merge bases into one virtual base by
/// recursively merging them pairwise, per RECURSIVE's fallback to RESOLVE on
/// failure. With zero or one base, returns it (or the null tree for none).
fn virtual_base(
    repo: &mut Repository,
    bases: &[ObjectId],
    options: &MergeOptions,
) -> Result<ObjectId, CommandError> {
    match bases {
        [] => Ok(empty_tree_commit(repo)?),
        [single] => Ok(*single),
        [first, rest @ ..] => {
            let mut acc = *first;
            for next in rest {
                match dispatch_merge(repo, &acc, next, &acc, options) {
                    Ok(result) if result.is_clean => {
                        let tree = result.tree.expect("clean result has a tree");
                        acc = write_merge_commit(repo, tree, acc, *next, Some("virtual base".into()))?;
                    }
                    _ => return Ok(acc),
                }
            }
            Ok(acc)
        }
    }
}

fn empty_tree_commit(repo: &mut Repository) -> Result<ObjectId, CommandError> {
    use git_object::{Commit, Object, ObjectType};
    let tree = repo.odb().write_raw(ObjectType::Tree, b"")?;
    let sig = effective_author(repo, None);
    let commit = Commit {
        tree,
        parents: Vec::new(),
        author: sig.clone(),
        committer: sig,
        encoding: None,
        gpgsig: None,
        extra_headers: Vec::new(),
        message: bstr::BString::from("virtual empty base"),
    };
    Ok(repo.odb().write(&Object::Commit(commit))?)
}

fn commit_tree(repo: &mut Repository, oid: &ObjectId) -> Result<ObjectId, CommandError> {
    use git_object::Object;
    let obj = repo
        .odb()
        .read(oid)?
        .ok_or_else(|| CommandError::CorruptObject(format!("missing object {oid}")))?;
    match obj {
        Object::Commit(c) => Ok(c.tree),
        Object::Tree(_) => Ok(*oid),
        other => Err(CommandError::CorruptObject(format!(
            "expected commit or tree, got {}",
            other.object_type()
        ))),
    }
}

fn write_merge_commit(
    repo: &mut Repository,
    tree: ObjectId,
    ours: ObjectId,
    theirs: ObjectId,
    message: Option<String>,
) -> Result<ObjectId, CommandError> {
    use git_object::{Commit, Object};
    let sig = effective_author(repo, None);
    let message = message.unwrap_or_else(|| format!("Merge commit '{theirs}'"));
    let commit = Commit {
        tree,
        parents: vec![ours, theirs],
        author: sig.clone(),
        committer: sig,
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
                Some(old_oid) => txn.update(target, old_oid, commit_oid, "merge"),
                None => txn.create(target, commit_oid, "merge (initial)"),
            }
            repo.refs().commit_transaction(txn)?;
        }
        _ => {
            repo.refs().write_ref(&head_ref, &commit_oid)?;
        }
    }
    Ok(())
}
