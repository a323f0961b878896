//! `CheckoutCommand`: switches branches, detaches HEAD, creates branches,
//! goes orphan, or restores specific paths from a tree into the index and
//! working tree.

use bstr::BString;
use git_diff::{diff_trees, DiffOptions};
use git_hash::{HashAlgorithm, Hasher, ObjectId};
use git_index::{Index, Stage};
use git_object::{FileMode, Object};
use git_ref::{RefName, RefStore, RefTransaction};
use git_repository::Repository;
use git_revwalk::resolve_revision;

use crate::worktree::Worktree;
use crate::CommandError;

/// Outcome of a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStatus {
    Ok,
    /// Local modifications would have been overwritten; nothing was changed.
    Conflicts,
}

/// Result of running a `CheckoutCommand`.
#[derive(Debug, Clone)]
pub struct CheckoutResult {
    pub status: CheckoutStatus,
    pub updated: Vec<BString>,
    pub conflicts: Vec<BString>,
}

/// Builds and runs a checkout.
pub struct CheckoutCommand<'r> {
    repo: &'r mut Repository,
    called: bool,
    branch: Option<String>,
    create_branch: Option<String>,
    start_point: Option<String>,
    detach: Option<String>,
    orphan: Option<String>,
    paths: Option<Vec<BString>>,
    tree: Option<String>,
    force: bool,
}

impl<'r> CheckoutCommand<'r> {
    pub fn new(repo: &'r mut Repository) -> Self {
        Self {
            repo,
            called: false,
            branch: None,
            create_branch: None,
            start_point: None,
            detach: None,
            orphan: None,
            paths: None,
            tree: None,
            force: false,
        }
    }

    fn check_not_called(&self) -> Result<(), CommandError> {
        if self.called {
            Err(CommandError::AlreadyCalled)
        } else {
            Ok(())
        }
    }

    /// Switch to an existing branch.
    pub fn branch(&mut self, name: impl Into<String>) -> &mut Self {
        self.branch = Some(name.into());
        self
    }

    /// Create a new branch (at `start_point`, default HEAD) and switch to it.
    pub fn create_branch(&mut self, name: impl Into<String>) -> &mut Self {
        self.create_branch = Some(name.into());
        self
    }

    pub fn start_point(&mut self, rev: impl Into<String>) -> &mut Self {
        self.start_point = Some(rev.into());
        self
    }

    /// Detach HEAD at this revision.
    pub fn detach(&mut self, rev: impl Into<String>) -> &mut Self {
        self.detach = Some(rev.into());
        self
    }

    /// Point HEAD at a branch name that does not yet exist, leaving the
    /// index and working tree untouched.
    pub fn orphan(&mut self, name: impl Into<String>) -> &mut Self {
        self.orphan = Some(name.into());
        self
    }

    /// Restore only these paths from `tree` (default HEAD) into the index
    /// and working tree, instead of switching branches.
    pub fn paths(&mut self, path: impl Into<BString>) -> &mut Self {
        self.paths.get_or_insert_with(Vec::new).push(path.into());
        self
    }

    /// Source tree for `paths` mode. Defaults to HEAD.
    pub fn tree(&mut self, rev: impl Into<String>) -> &mut Self {
        self.tree = Some(rev.into());
        self
    }

    /// Bypass the dirty-worktree check.
    pub fn force(&mut self, force: bool) -> &mut Self {
        self.force = force;
        self
    }

    pub fn call(&mut self) -> Result<CheckoutResult, CommandError> {
        self.check_not_called()?;
        self.called = true;

        if let Some(paths) = self.paths.clone() {
            return self.checkout_paths(&paths);
        }

        if let Some(name) = self.orphan.clone() {
            return self.checkout_orphan(&name);
        }

        let work_tree = self
            .repo
            .work_tree()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| CommandError::CorruptObject("no working tree".into()))?;
        let wt = crate::worktree::FsWorktree::new(&work_tree);

        let (target_oid, symbolic_target) = self.resolve_target()?;
        let target_tree = commit_tree(self.repo, &target_oid)?;

        let old_tree = match self.repo.head_oid()? {
            Some(head_oid) => Some(commit_tree(self.repo, &head_oid)?),
            None => None,
        };

        if !self.force {
            let changed = changed_paths(self.repo, old_tree.as_ref(), &target_tree)?;
            let dirty = dirty_paths(self.repo, &wt)?;
            let conflicts: Vec<BString> = changed
                .into_iter()
                .filter(|p| dirty.contains(p))
                .collect();
            if !conflicts.is_empty() {
                return Ok(CheckoutResult {
                    status: CheckoutStatus::Conflicts,
                    updated: Vec::new(),
                    conflicts,
                });
            }
        }

        let report = wt.checkout_tree(self.repo.odb(), &target_tree)?;

        let new_index = Index::read_tree(self.repo.odb(), &target_tree)?;
        self.repo.set_index(new_index);
        self.repo.write_index()?;

        let head_ref = RefName::new("HEAD")?;
        match symbolic_target {
            Some(branch_ref) => self.repo.refs().write_symbolic_ref(&head_ref, &branch_ref)?,
            None => self.repo.refs().write_ref(&head_ref, &target_oid)?,
        }

        Ok(CheckoutResult {
            status: CheckoutStatus::Ok,
            updated: report.updated,
            conflicts: Vec::new(),
        })
    }

    /// Determine the target commit and, if this switches to a named branch
    /// (existing or newly created), the branch ref HEAD should point at
    /// symbolically. `None` for the ref means HEAD detaches directly at the
    /// commit.
    fn resolve_target(&mut self) -> Result<(ObjectId, Option<RefName>), CommandError> {
        if let Some(name) = self.create_branch.clone() {
            validate_branch_name(&name)?;
            let full = format!("refs/heads/{name}");
            let ref_name = RefName::new(full)?;
            let start = match &self.start_point {
                Some(rev) => resolve_revision(self.repo, rev)?,
                None => self
                    .repo
                    .head_oid()?
                    .ok_or_else(|| CommandError::RefNotFound("HEAD".into()))?,
            };
            let mut txn = RefTransaction::new();
            txn.create(ref_name.clone(), start, "branch: Created from start-point");
            self.repo.refs().commit_transaction(txn)?;
            return Ok((start, Some(ref_name)));
        }

        if let Some(name) = self.branch.clone() {
            let full = format!("refs/heads/{name}");
            let ref_name = RefName::new(full)?;
            let oid = self
                .repo
                .refs()
                .resolve_to_oid(&ref_name)?
                .ok_or_else(|| CommandError::RefNotFound(full))?;
            return Ok((oid, Some(ref_name)));
        }

        if let Some(rev) = self.detach.clone() {
            let oid = resolve_revision(self.repo, &rev)?;
            return Ok((oid, None));
        }

        Err(CommandError::InvalidRefName(
            "no checkout target specified".into(),
        ))
    }

    fn checkout_orphan(&mut self, name: &str) -> Result<CheckoutResult, CommandError> {
        validate_branch_name(name)?;
        let full = format!("refs/heads/{name}");
        let ref_name = RefName::new(full)?;
        let head_ref = RefName::new("HEAD")?;
        self.repo.refs().write_symbolic_ref(&head_ref, &ref_name)?;
        Ok(CheckoutResult {
            status: CheckoutStatus::Ok,
            updated: Vec::new(),
            conflicts: Vec::new(),
        })
    }

    fn checkout_paths(&mut self, paths: &[BString]) -> Result<CheckoutResult, CommandError> {
        let tree_oid = match self.tree.clone() {
            Some(rev) => {
                let oid = resolve_revision(self.repo, &rev)?;
                commit_tree(self.repo, &oid)?
            }
            None => {
                let head_oid = self
                    .repo
                    .head_oid()?
                    .ok_or_else(|| CommandError::RefNotFound("HEAD".into()))?;
                commit_tree(self.repo, &head_oid)?
            }
        };

        let work_tree = self
            .repo
            .work_tree()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| CommandError::CorruptObject("no working tree".into()))?;
        let wt = crate::worktree::FsWorktree::new(&work_tree);

        let report = wt.checkout_paths(self.repo.odb(), &tree_oid, paths)?;

        for path in paths {
            if let Some((oid, mode)) = find_in_tree(self.repo.odb(), &tree_oid, path.as_ref())? {
                self.repo.index_mut()?.add(git_index::IndexEntry {
                    path: path.clone(),
                    oid,
                    mode,
                    stage: Stage::Normal,
                    stat: Default::default(),
                    flags: Default::default(),
                });
            }
        }
        self.repo.write_index()?;

        Ok(CheckoutResult {
            status: if report.failed.is_empty() {
                CheckoutStatus::Ok
            } else {
                CheckoutStatus::Conflicts
            },
            updated: report.updated,
            conflicts: report.failed,
        })
    }
}

fn validate_branch_name(name: &str) -> Result<(), CommandError> {
    if name.is_empty() {
        return Err(CommandError::InvalidRefName("branch name is empty".into()));
    }
    if name.starts_with('-') {
        return Err(CommandError::InvalidRefName(format!(
            "'{name}' starts with '-'"
        )));
    }
    Ok(())
}

fn commit_tree(repo: &mut Repository, oid: &ObjectId) -> Result<ObjectId, CommandError> {
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

fn changed_paths(
    repo: &mut Repository,
    old_tree: Option<&ObjectId>,
    new_tree: &ObjectId,
) -> Result<Vec<BString>, CommandError> {
    let result = diff_trees(repo.odb(), old_tree, Some(new_tree), &DiffOptions::default())?;
    Ok(result.files.iter().map(|f| f.path().to_owned()).collect())
}

fn dirty_paths(repo: &mut Repository, wt: &crate::worktree::FsWorktree) -> Result<Vec<BString>, CommandError> {
    let algo: HashAlgorithm = repo.hash_algo();
    let entries: Vec<_> = repo
        .index()?
        .iter()
        .filter(|e| e.stage == Stage::Normal)
        .map(|e| (e.path.clone(), e.oid))
        .collect();

    let mut dirty = Vec::new();
    for (path, oid) in entries {
        let path_ref = path.as_ref();
        if !wt.exists(path_ref) {
            dirty.push(path);
            continue;
        }
        let content = wt.read_content(path_ref)?;
        let computed = Hasher::hash_object(algo, "blob", &content)
            .map_err(|e| CommandError::CorruptObject(e.to_string()))?;
        if computed != oid {
            dirty.push(path);
        }
    }
    Ok(dirty)
}

/// Look up a path's `(oid, mode)` within a tree by walking it recursively.
fn find_in_tree(
    odb: &git_odb::ObjectDatabase,
    tree_id: &ObjectId,
    target: &bstr::BStr,
) -> Result<Option<(ObjectId, FileMode)>, CommandError> {
    let obj = odb
        .read(tree_id)?
        .ok_or_else(|| CommandError::CorruptObject(format!("missing tree {tree_id}")))?;
    let tree = match obj {
        Object::Tree(t) => t,
        _ => return Ok(None),
    };
    find_in_tree_entries(odb, &tree, b"", target)
}

fn find_in_tree_entries(
    odb: &git_odb::ObjectDatabase,
    tree: &git_object::Tree,
    prefix: &[u8],
    target: &bstr::BStr,
) -> Result<Option<(ObjectId, FileMode)>, CommandError> {
    for entry in tree.iter() {
        let mut path = prefix.to_vec();
        if !path.is_empty() {
            path.push(b'/');
        }
        path.extend_from_slice(&entry.name);

        if path == target.as_bytes() && !entry.mode.is_tree() {
            return Ok(Some((entry.oid, entry.mode)));
        }
        if entry.mode.is_tree() && target.starts_with(&path) {
            let obj = odb
                .read(&entry.oid)?
                .ok_or_else(|| CommandError::CorruptObject(format!("missing tree {}", entry.oid)))?;
            if let Object::Tree(sub) = obj {
                if let Some(found) = find_in_tree_entries(odb, &sub, &path, target)? {
                    return Ok(Some(found));
                }
            }
        }
    }
    Ok(None)
}
