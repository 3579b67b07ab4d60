//! Dependency manifest parsers.
//!
//! Each supported format implements [`ManifestParser`], which extracts
//! `name → version` pairs.  [`parser_for`] picks the parser by file name.

mod csproj;
mod gomod;
mod maven;
mod npm;
mod pip;

use std::collections::BTreeMap;

use thiserror::Error;

pub use csproj::CsprojManifest;
pub use gomod::GoModule;
pub use maven::MavenPom;
pub use npm::PackageJson;
pub use pip::Requirements;

/// Version recorded when a manifest does not pin one.
pub const UNSPECIFIED: &str = "unspecified";

pub type Dependencies = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed manifest: {0}")]
    Malformed(String),
}

pub trait ManifestParser: Send + Sync {
    /// Language the manifest belongs to, e.g. `"python"`.
    fn language(&self) -> &'static str;

    fn package_manager(&self) -> &'static str;

    fn matches(&self, file_name: &str) -> bool;

    fn parse(&self, content: &str) -> Result<Dependencies, ManifestError>;
}

static PARSERS: &[&dyn ManifestParser] = &[
    &PackageJson,
    &Requirements,
    &GoModule,
    &MavenPom,
    &CsprojManifest,
];

/// The parser responsible for `file_name` (last path component).
pub fn parser_for(file_name: &str) -> Option<&'static dyn ManifestParser> {
    PARSERS.iter().copied().find(|p| p.matches(file_name))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn selects_by_file_name() {
        assert_eq!(parser_for("package.json").unwrap().package_manager(), "npm");
        assert_eq!(parser_for("requirements.txt").unwrap().language(), "python");
        assert_eq!(parser_for("go.mod").unwrap().language(), "go");
        assert_eq!(parser_for("pom.xml").unwrap().package_manager(), "maven");
        assert_eq!(parser_for("Legacy.Web.csproj").unwrap().language(), "csharp");
        assert!(parser_for("package-lock.json").is_none());
        assert!(parser_for("README.md").is_none());
    }
}
