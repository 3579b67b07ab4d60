use serde::Deserialize;

use super::{Dependencies, ManifestError, ManifestParser};

/// `package.json`: `dependencies` and `devDependencies`.
#[derive(Debug, Clone, Copy)]
pub struct PackageJson;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    dependencies: Dependencies,
    #[serde(default)]
    dev_dependencies: Dependencies,
}

impl ManifestParser for PackageJson {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn package_manager(&self) -> &'static str {
        "npm"
    }

    fn matches(&self, file_name: &str) -> bool {
        file_name == "package.json"
    }

    fn parse(&self, content: &str) -> Result<Dependencies, ManifestError> {
        let manifest: Manifest = serde_json::from_str(content)?;
        let mut deps = manifest.dev_dependencies;
        // Runtime entries win over dev entries of the same name.
        deps.extend(manifest.dependencies);
        Ok(deps)
    }
}
