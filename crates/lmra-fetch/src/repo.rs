//! Repository references and the [`RepoSource`] seam.
//!
//! The analysis pipeline only talks to [`RepoSource`]; [`crate::GitHubClient`]
//! is the production implementation and tests substitute in-memory stubs.

use async_trait::async_trait;

use crate::error::FetchError;

/// An `owner/name` GitHub repository, optionally pinned to a branch taken
/// from a `/tree/<branch>` URL suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
    pub branch: Option<String>,
}

impl RepoRef {
    /// Parse a repository reference.
    ///
    /// Accepted forms:
    /// - `https://github.com/owner/repo`
    /// - `https://github.com/owner/repo.git`
    /// - `https://github.com/owner/repo/tree/branch`
    /// - `github.com/owner/repo`
    /// - `owner/repo`
    pub fn parse(input: &str) -> Result<Self, FetchError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(FetchError::InvalidUrl("repository URL is empty".into()));
        }

        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"));
        let had_scheme = without_scheme.is_some();
        let without_scheme = without_scheme.unwrap_or(trimmed);

        let path = match without_scheme
            .strip_prefix("www.github.com/")
            .or_else(|| without_scheme.strip_prefix("github.com/"))
        {
            Some(rest) => rest,
            // GitHub owners never contain a dot, so a dotted first segment is a host.
            None if had_scheme
                || without_scheme.split('/').next().is_some_and(|s| s.contains('.')) =>
            {
                return Err(FetchError::InvalidUrl(format!(
                    "{trimmed} is not a GitHub repository URL"
                )));
            }
            None => without_scheme,
        };

        let mut segments = path.trim_end_matches('/').split('/').filter(|s| !s.is_empty());
        let owner = segments.next();
        let name = segments.next();
        let (owner, name) = match (owner, name) {
            (Some(o), Some(n)) => (o, n.trim_end_matches(".git")),
            _ => {
                return Err(FetchError::InvalidUrl(format!(
                    "{trimmed} must name an owner and a repository"
                )));
            }
        };

        if !is_valid_segment(owner) || !is_valid_segment(name) {
            return Err(FetchError::InvalidUrl(format!(
                "{trimmed} contains invalid owner or repository characters"
            )));
        }

        let branch = match (segments.next(), segments.next()) {
            (Some("tree"), Some(_)) => {
                // Branch names may themselves contain slashes.
                let start = path.find("/tree/").map(|i| i + "/tree/".len());
                start.map(|i| path[i..].trim_end_matches('/').to_owned())
            }
            _ => None,
        };

        Ok(Self {
            owner: owner.to_owned(),
            name: name.to_owned(),
            branch,
        })
    }

    /// `owner/name`, as used in API paths.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Canonical browser URL.
    pub fn html_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.name)
    }
}

fn is_valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// A file (blob) entry from a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub sha: String,
    pub size: u64,
}

impl TreeEntry {
    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Read-only access to a remote repository's content.
///
/// Every call is one network round-trip with a finite timeout; failures are
/// surfaced to the caller and never retried here.
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// The repository's default branch.
    async fn default_branch(&self, repo: &RepoRef) -> Result<String, FetchError>;

    /// All blobs reachable from `branch`, in the order the API lists them.
    async fn list_tree(&self, repo: &RepoRef, branch: &str) -> Result<Vec<TreeEntry>, FetchError>;

    /// Raw content of one blob, decoded as (lossy) UTF-8.
    async fn fetch_blob(&self, repo: &RepoRef, entry: &TreeEntry) -> Result<String, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_https_url() {
        let r = RepoRef::parse("https://github.com/octo/hello").unwrap();
        assert_eq!(r.owner, "octo");
        assert_eq!(r.name, "hello");
        assert_eq!(r.branch, None);
    }

    #[test]
    fn strips_git_suffix_and_trailing_slash() {
        let r = RepoRef::parse("https://github.com/octo/hello.git/").unwrap();
        assert_eq!(r.full_name(), "octo/hello");
    }

    #[test]
    fn extracts_branch_from_tree_url() {
        let r = RepoRef::parse("https://github.com/octo/hello/tree/feature/x").unwrap();
        assert_eq!(r.branch.as_deref(), Some("feature/x"));
    }

    #[test]
    fn accepts_short_form() {
        let r = RepoRef::parse("octo/hello").unwrap();
        assert_eq!(r.html_url(), "https://github.com/octo/hello");
    }

    #[test]
    fn rejects_other_hosts() {
        assert!(matches!(
            RepoRef::parse("https://gitlab.com/octo/hello"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn rejects_missing_repo_name() {
        assert!(RepoRef::parse("https://github.com/octo").is_err());
        assert!(RepoRef::parse("   ").is_err());
    }

    #[test]
    fn tree_entry_file_name() {
        let e = TreeEntry {
            path: "src/app/main.py".into(),
            sha: "abc".into(),
            size: 1,
        };
        assert_eq!(e.file_name(), "main.py");
    }
}
