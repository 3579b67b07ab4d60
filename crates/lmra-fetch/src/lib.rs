//! Read-only GitHub repository access for the LMRA gateway.
//!
//! ```rust,ignore
//! let client = Api::new().build()?;
//! let repo = RepoRef::parse("https://github.com/owner/repo")?;
//! let branch = client.default_branch(&repo).await?;
//! let files = client.list_tree(&repo, &branch).await?;
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod repo;

pub use api::Api;
pub use client::GitHubClient;
pub use error::FetchError;
pub use repo::{RepoRef, RepoSource, TreeEntry};
