//! Fire-once builder porcelain commands.
//!
//! Every command in this crate follows the same shape: a struct with private
//! fields, `&mut self -> &mut Self` setters, and a `call()` that validates,
//! executes, and flips an internal `called` flag before doing any work so a
//! caller can never observe a half-applied second call. Reuse of a command
//! after `call()` — another setter or another `call()` — returns
//! [`CommandError::AlreadyCalled`].

pub mod add;
pub mod blame;
pub mod branch;
pub mod checkout;
pub mod cherry_pick;
pub mod commit;
pub mod diff;
pub mod log;
pub mod merge;
pub mod reset;
pub mod revert;
pub mod rm;
pub mod worktree;

pub use add::AddCommand;
pub use blame::{BlameCommand, BlameLine};
pub use branch::{BranchCreateCommand, BranchDeleteCommand, BranchListCommand};
pub use checkout::{CheckoutCommand, CheckoutResult, CheckoutStatus};
pub use cherry_pick::CherryPickCommand;
pub use commit::CommitCommand;
pub use diff::DiffCommand;
pub use log::LogCommand;
pub use merge::{MergeCommand, MergeOutcome, MergeStatus};
pub use reset::{ResetCommand, ResetMode};
pub use revert::RevertCommand;
pub use rm::RmCommand;
pub use worktree::{FsWorktree, WalkEntry, Worktree, WorktreeError};

use git_hash::ObjectId;

/// Errors from the command layer, carrying the stable kinds a caller can
/// match on regardless of which lower-layer error produced them.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("commit message must not be empty")]
    NoMessage,

    #[error("refusing to create empty commit (use allow_empty)")]
    EmptyCommit,

    #[error("no pathspec given and no default configured")]
    NoFilepattern,

    #[error("invalid reference name: {0}")]
    InvalidRefName(String),

    #[error("reference not found: {0}")]
    RefNotFound(String),

    #[error("invalid merge heads: {0}")]
    InvalidMergeHeads(String),

    #[error("not a fast-forward")]
    NotFastForward,

    #[error("cherry-picking a merge commit requires mainline_parent_number")]
    MultipleParentsNotAllowed,

    #[error("corrupt object: {0}")]
    CorruptObject(String),

    #[error("missing delta base: {0}")]
    MissingDeltaBase(ObjectId),

    #[error("delta chain too deep: {0}")]
    DeltaChainTooDeep(usize),

    #[error("command already called")]
    AlreadyCalled,

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    Repo(#[from] git_repository::RepoError),

    #[error(transparent)]
    Odb(#[from] git_odb::OdbError),

    #[error(transparent)]
    Index(#[from] git_index::IndexError),

    #[error(transparent)]
    Ref(#[from] git_ref::RefError),

    #[error(transparent)]
    Diff(#[from] git_diff::DiffError),

    #[error(transparent)]
    Merge(#[from] git_merge::MergeError),

    #[error(transparent)]
    RevWalk(#[from] git_revwalk::RevWalkError),

    #[error(transparent)]
    Worktree(#[from] worktree::WorktreeError),
}

/// Shared helper: resolve the effective committer/author identity for a
/// command. Falls back to `repo.settings().default_author`, and finally to
/// an anonymous placeholder identity timestamped now — commit authorship
/// validation beyond "some identity is present" is a config-loading concern
/// this core does not own.
pub(crate) fn effective_author(
    repo: &git_repository::Repository,
    explicit: Option<git_utils::date::Signature>,
) -> git_utils::date::Signature {
    explicit
        .or_else(|| repo.settings().default_author.clone())
        .unwrap_or_else(|| git_utils::date::Signature {
            name: "unknown".into(),
            email: "unknown@localhost".into(),
            date: git_utils::date::GitDate::now(),
        })
}
