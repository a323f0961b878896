//! `BranchCreateCommand` / `BranchDeleteCommand` / `BranchListCommand`:
//! ref-table operations under `refs/heads/` with name validation.

use git_hash::ObjectId;
use git_ref::{RefName, RefStore, RefTransaction};
use git_repository::Repository;
use git_revwalk::resolve_revision;

use crate::CommandError;

/// One entry in a branch listing.
#[derive(Debug, Clone)]
pub struct BranchInfo {
    /// Short name, e.g. `main` (without the `refs/heads/` prefix).
    pub name: String,
    /// Tip commit.
    pub oid: ObjectId,
    /// Whether this is the branch HEAD currently points to.
    pub is_head: bool,
}

fn validate_branch_name(name: &str) -> Result<(), CommandError> {
    if name.is_empty() {
        return Err(CommandError::InvalidRefName("branch name is empty".into()));
    }
    // RefName::new already rejects `..`, `@{`, control chars, trailing `/`,
    // etc. but not a leading `-`, which would otherwise be ambiguous with a
    // command-line flag.
    if name.starts_with('-') {
        return Err(CommandError::InvalidRefName(format!(
            "'{name}' starts with '-'"
        )));
    }
    Ok(())
}

/// Creates a new branch ref pointing at a start point (default HEAD).
///
/// ```ignore
/// BranchCreateCommand::new(&mut repo)
///     .name("feature")
///     .call()?;
/// ```
pub struct BranchCreateCommand<'r> {
    repo: &'r mut Repository,
    called: bool,
    name: Option<String>,
    start_point: Option<String>,
    force: bool,
}

impl<'r> BranchCreateCommand<'r> {
    pub fn new(repo: &'r mut Repository) -> Self {
        Self {
            repo,
            called: false,
            name: None,
            start_point: None,
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

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Revision the new branch should point at. Defaults to HEAD.
    pub fn start_point(&mut self, rev: impl Into<String>) -> &mut Self {
        self.start_point = Some(rev.into());
        self
    }

    /// Move the branch ref if it already exists.
    pub fn force(&mut self, force: bool) -> &mut Self {
        self.force = force;
        self
    }

    pub fn call(&mut self) -> Result<ObjectId, CommandError> {
        self.check_not_called()?;
        self.called = true;

        let name = self
            .name
            .clone()
            .ok_or_else(|| CommandError::InvalidRefName("branch name required".into()))?;
        validate_branch_name(&name)?;

        let full = format!("refs/heads/{name}");
        let ref_name = RefName::new(full)?;

        let target = match &self.start_point {
            Some(rev) => resolve_revision(self.repo, rev)?,
            None => self
                .repo
                .head_oid()?
                .ok_or_else(|| CommandError::RefNotFound("HEAD".into()))?,
        };

        let mut txn = RefTransaction::new();
        if self.force {
            match self.repo.refs().resolve_to_oid(&ref_name)? {
                Some(old_oid) => {
                    txn.update(ref_name.clone(), old_oid, target, "branch: Reset start-point")
                }
                None => txn.create(ref_name.clone(), target, "branch: Created from start-point"),
            }
        } else {
            txn.create(ref_name.clone(), target, "branch: Created from start-point");
        }
        self.repo.refs().commit_transaction(txn)?;

        Ok(target)
    }
}

/// Deletes a branch ref.
pub struct BranchDeleteCommand<'r> {
    repo: &'r mut Repository,
    called: bool,
    name: Option<String>,
    force: bool,
}

impl<'r> BranchDeleteCommand<'r> {
    pub fn new(repo: &'r mut Repository) -> Self {
        Self {
            repo,
            called: false,
            name: None,
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

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Delete even if not merged anywhere (merge-state tracking is out of
    /// scope for this core; the flag is accepted and has no further effect).
    pub fn force(&mut self, force: bool) -> &mut Self {
        self.force = force;
        self
    }

    pub fn call(&mut self) -> Result<ObjectId, CommandError> {
        self.check_not_called()?;
        self.called = true;
        let _ = self.force;

        let name = self
            .name
            .clone()
            .ok_or_else(|| CommandError::InvalidRefName("branch name required".into()))?;
        validate_branch_name(&name)?;

        let full = format!("refs/heads/{name}");
        let ref_name = RefName::new(full)?;

        let old_oid = self
            .repo
            .refs()
            .resolve_to_oid(&ref_name)?
            .ok_or_else(|| CommandError::RefNotFound(ref_name.to_string()))?;

        let mut txn = RefTransaction::new();
        txn.delete(ref_name, old_oid, "branch: deleted");
        self.repo.refs().commit_transaction(txn)?;

        Ok(old_oid)
    }
}

/// Lists branches under `refs/heads/`.
pub struct BranchListCommand<'r> {
    repo: &'r Repository,
    called: bool,
}

impl<'r> BranchListCommand<'r> {
    pub fn new(repo: &'r Repository) -> Self {
        Self {
            repo,
            called: false,
        }
    }

    fn check_not_called(&self) -> Result<(), CommandError> {
        if self.called {
            Err(CommandError::AlreadyCalled)
        } else {
            Ok(())
        }
    }

    pub fn call(&mut self) -> Result<Vec<BranchInfo>, CommandError> {
        self.check_not_called()?;
        self.called = true;

        let current = self.repo.current_branch()?;

        let mut branches = Vec::new();
        for entry in self.repo.refs().iter(Some("refs/heads/"))? {
            let reference = entry?;
            let short = reference.name().short_name().to_string();
            if let Some(oid) = reference.target_oid() {
                let is_head = current.as_deref() == Some(short.as_str());
                branches.push(BranchInfo {
                    name: short,
                    oid,
                    is_head,
                });
            }
        }
        branches.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(branches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::CommitCommand;

    fn init_repo_with_commit() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = Repository::init(dir.path()).unwrap();
        CommitCommand::new(&mut repo)
            .message("initial")
            .allow_empty(true)
            .call()
            .unwrap();
        (dir, repo)
    }

    #[test]
    fn create_branch_at_head() {
        let (_dir, mut repo) = init_repo_with_commit();
        let head = repo.head_oid().unwrap().unwrap();
        let oid = BranchCreateCommand::new(&mut repo)
            .name("feature")
            .call()
            .unwrap();
        assert_eq!(oid, head);
    }

    #[test]
    fn create_duplicate_without_force_fails() {
        let (_dir, mut repo) = init_repo_with_commit();
        BranchCreateCommand::new(&mut repo)
            .name("feature")
            .call()
            .unwrap();
        let err = BranchCreateCommand::new(&mut repo)
            .name("feature")
            .call()
            .unwrap_err();
        assert!(matches!(err, CommandError::Ref(_)));
    }

    #[test]
    fn rejects_leading_dash() {
        let (_dir, mut repo) = init_repo_with_commit();
        let err = BranchCreateCommand::new(&mut repo)
            .name("-weird")
            .call()
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidRefName(_)));
    }

    #[test]
    fn delete_branch() {
        let (_dir, mut repo) = init_repo_with_commit();
        BranchCreateCommand::new(&mut repo)
            .name("feature")
            .call()
            .unwrap();
        BranchDeleteCommand::new(&mut repo)
            .name("feature")
            .call()
            .unwrap();
        let err = BranchDeleteCommand::new(&mut repo)
            .name("feature")
            .call()
            .unwrap_err();
        assert!(matches!(err, CommandError::RefNotFound(_)));
    }

    #[test]
    fn list_branches_marks_head() {
        let (_dir, mut repo) = init_repo_with_commit();
        BranchCreateCommand::new(&mut repo)
            .name("feature")
            .call()
            .unwrap();

        let branches = BranchListCommand::new(&repo).call().unwrap();
        let names: Vec<_> = branches.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["feature", "main"]);
        assert!(branches.iter().find(|b| b.name == "main").unwrap().is_head);
        assert!(!branches.iter().find(|b| b.name == "feature").unwrap().is_head);
    }
}
