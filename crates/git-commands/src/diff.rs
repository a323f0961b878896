//! `DiffCommand`: compares two trees, the index, or the working tree.

use bstr::BString;
use git_diff::{diff_trees, DiffOptions, DiffResult};
use git_hash::ObjectId;
use git_repository::Repository;

use crate::CommandError;

/// Source for one side of a diff.
#[derive(Debug, Clone)]
enum TreeSource {
    /// HEAD's tree (or no tree for an unborn branch).
    Head,
    /// An explicit commit-ish, resolved at `call()` time.
    Rev(String),
    /// An explicit tree OID.
    Tree(ObjectId),
}

/// Builds and runs a tree/index/working-tree diff.
pub struct DiffCommand<'r> {
    repo: &'r mut Repository,
    called: bool,
    old: Option<TreeSource>,
    new: Option<TreeSource>,
    cached: bool,
    pathspec: Option<Vec<BString>>,
    options: DiffOptions,
}

impl<'r> DiffCommand<'r> {
    pub fn new(repo: &'r mut Repository) -> Self {
        Self {
            repo,
            called: false,
            old: None,
            new: None,
            cached: false,
            pathspec: None,
            options: DiffOptions::default(),
        }
    }

    fn check_not_called(&self) -> Result<(), CommandError> {
        if self.called {
            Err(CommandError::AlreadyCalled)
        } else {
            Ok(())
        }
    }

    /// Old side is this commit-ish (rev-parse syntax).
    pub fn old_rev(&mut self, rev: impl Into<String>) -> &mut Self {
        self.old = Some(TreeSource::Rev(rev.into()));
        self
    }

    /// Old side is this tree OID directly.
    pub fn old_tree(&mut self, tree: ObjectId) -> &mut Self {
        self.old = Some(TreeSource::Tree(tree));
        self
    }

    /// New side is this commit-ish (rev-parse syntax).
    pub fn new_rev(&mut self, rev: impl Into<String>) -> &mut Self {
        self.new = Some(TreeSource::Rev(rev.into()));
        self
    }

    /// New side is this tree OID directly.
    pub fn new_tree(&mut self, tree: ObjectId) -> &mut Self {
        self.new = Some(TreeSource::Tree(tree));
        self
    }

    /// Compare HEAD against the index instead of the working tree
    /// (`git diff --cached`). Ignored once `old`/`new` are both set
    /// explicitly.
    pub fn cached(&mut self, cached: bool) -> &mut Self {
        self.cached = cached;
        self
    }

    pub fn pathspec(&mut self, path: impl Into<BString>) -> &mut Self {
        self.pathspec.get_or_insert_with(Vec::new).push(path.into());
        self
    }

    pub fn detect_renames(&mut self, detect: bool) -> &mut Self {
        self.options.detect_renames = detect;
        self
    }

    pub fn context_lines(&mut self, lines: u32) -> &mut Self {
        self.options.context_lines = lines;
        self
    }

    pub fn call(&mut self) -> Result<DiffResult, CommandError> {
        self.check_not_called()?;
        self.called = true;

        self.options.pathspec = self.pathspec.clone();

        // No explicit trees at all: defer to the working-tree/index
        // comparisons the teacher already implements directly against the
        // live repository state.
        if self.old.is_none() && self.new.is_none() {
            return Ok(if self.cached {
                git_diff::worktree::diff_head_to_index(self.repo, &self.options)?
            } else {
                git_diff::worktree::diff_index_to_worktree(self.repo, &self.options)?
            });
        }

        let old_tree = match &self.old {
            Some(src) => resolve_tree(self.repo, src)?,
            None => resolve_tree(self.repo, &TreeSource::Head)?,
        };
        let new_tree = match &self.new {
            Some(src) => resolve_tree(self.repo, src)?,
            None => {
                if self.cached {
                    let index = self.repo.index()?;
                    Some(index.write_tree(self.repo.odb())?)
                } else {
                    resolve_tree(self.repo, &TreeSource::Head)?
                }
            }
        };

        Ok(diff_trees(
            self.repo.odb(),
            old_tree.as_ref(),
            new_tree.as_ref(),
            &self.options,
        )?)
    }
}

fn resolve_tree(repo: &mut Repository, src: &TreeSource) -> Result<Option<ObjectId>, CommandError> {
    let commit_oid = match src {
        TreeSource::Tree(oid) => return Ok(Some(*oid)),
        TreeSource::Head => match repo.head_oid()? {
            Some(oid) => oid,
            None => return Ok(None),
        },
        TreeSource::Rev(rev) => git_revwalk::resolve_revision(repo, rev)
            .map_err(|_| CommandError::RefNotFound(rev.clone()))?,
    };
    let obj = repo
        .odb()
        .read(&commit_oid)?
        .ok_or_else(|| CommandError::CorruptObject(format!("missing object {commit_oid}")))?;
    match obj {
        git_object::Object::Commit(c) => Ok(Some(c.tree)),
        git_object::Object::Tree(_) => Ok(Some(commit_oid)),
        other => Err(CommandError::CorruptObject(format!(
            "expected commit or tree, got {}",
            other.object_type()
        ))),
    }
}
