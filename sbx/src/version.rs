//! Version resolution over git tags.
//!
//! Versions are read from the repository's tags, filtered to valid
//! `MAJOR.MINOR.PATCH` strings, and ordered numerically. The greatest tag
//! is the current version; the second-greatest drives rollback.

use git2::build::CheckoutBuilder;
use git2::{ObjectType, Repository};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum VersionError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Invalid version string: {0}")]
    InvalidVersion(String),

    #[error("No version tag found. Tag the release commit with a version number")]
    NoVersionTag,

    #[error("No previous version tag found")]
    NoPreviousVersion,

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    #[error("No HEAD commit found")]
    NoHeadCommit,
}

pub type VersionResult<T> = Result<T, VersionError>;

/// A validated semantic version. Ordering is numeric per component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let parts: Vec<&str> = digits.split('.').collect();
        if parts.len() != 3 {
            return Err(VersionError::InvalidVersion(s.to_string()));
        }

        let parse = |part: &str| {
            part.parse::<u64>()
                .map_err(|_| VersionError::InvalidVersion(s.to_string()))
        };

        Ok(Version {
            major: parse(parts[0])?,
            minor: parse(parts[1])?,
            patch: parse(parts[2])?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A version together with the tag it was parsed from (the tag may carry
/// a `v` prefix the version normalizes away).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag {
    pub version: Version,
    pub tag: String,
}

/// All valid version tags in the repository, sorted ascending.
pub fn version_tags(repo_path: &Path) -> VersionResult<Vec<VersionTag>> {
    let repo = Repository::open(repo_path)?;
    let names = repo.tag_names(None)?;

    let mut tags: Vec<VersionTag> = names
        .iter()
        .flatten()
        .filter_map(|name| {
            name.parse::<Version>().ok().map(|version| VersionTag {
                version,
                tag: name.to_string(),
            })
        })
        .collect();
    tags.sort_by(|a, b| a.version.cmp(&b.version));
    Ok(tags)
}

/// The greatest valid version tag.
pub fn current_version(repo_path: &Path) -> VersionResult<VersionTag> {
    version_tags(repo_path)?
        .pop()
        .ok_or(VersionError::NoVersionTag)
}

/// The second-greatest valid version tag, used for rollback.
pub fn previous_version(repo_path: &Path) -> VersionResult<VersionTag> {
    let mut tags = version_tags(repo_path)?;
    if tags.len() < 2 {
        return Err(VersionError::NoPreviousVersion);
    }
    tags.pop();
    tags.pop().ok_or(VersionError::NoPreviousVersion)
}

/// Commit hash a tag points at (peeling annotated tags).
pub fn commit_for_tag(repo_path: &Path, tag: &str) -> VersionResult<String> {
    let repo = Repository::open(repo_path)?;
    let object = repo
        .revparse_single(tag)
        .map_err(|_| VersionError::TagNotFound(tag.to_string()))?;
    let commit = object.peel(ObjectType::Commit)?;
    Ok(commit.id().to_string())
}

/// Detaches HEAD at the given commit with a forced tree checkout.
pub fn checkout_commit(repo_path: &Path, commit_hash: &str) -> VersionResult<()> {
    let repo = Repository::open(repo_path)?;
    let oid = git2::Oid::from_str(commit_hash)?;
    let commit = repo.find_commit(oid)?;

    let mut options = CheckoutBuilder::new();
    options.force();
    repo.checkout_tree(commit.as_object(), Some(&mut options))?;
    repo.set_head_detached(oid)?;

    info!(commit = commit_hash, "checked out commit");
    Ok(())
}

/// Current HEAD commit hash.
pub fn head_commit(repo_path: &Path) -> VersionResult<String> {
    let repo = Repository::open(repo_path)?;
    let head = repo.head()?;
    let oid = head.target().ok_or(VersionError::NoHeadCommit)?;
    Ok(oid.to_string())
}
