use super::{Dependencies, ManifestError, ManifestParser};

/// `go.mod` `require` directives, single-line and block form.
#[derive(Debug, Clone, Copy)]
pub struct GoModule;

fn requirement(spec: &str) -> Option<(String, String)> {
    let spec = spec.split("//").next().unwrap_or(spec);
    let mut parts = spec.split_whitespace();
    let module = parts.next()?;
    let version = parts.next()?;
    Some((module.to_owned(), version.to_owned()))
}

impl ManifestParser for GoModule {
    fn language(&self) -> &'static str {
        "go"
    }

    fn package_manager(&self) -> &'static str {
        "go modules"
    }

    fn matches(&self, file_name: &str) -> bool {
        file_name == "go.mod"
    }

    fn parse(&self, content: &str) -> Result<Dependencies, ManifestError> {
        let mut deps = Dependencies::new();
        let mut in_block = false;
        for line in content.lines().map(str::trim) {
            if in_block {
                if line.starts_with(')') {
                    in_block = false;
                } else if let Some((m, v)) = requirement(line) {
                    deps.insert(m, v);
                }
                continue;
            }
            let Some(rest) = line.strip_prefix("require") else {
                continue;
            };
            let rest = rest.trim();
            if rest.starts_with('(') {
                in_block = true;
            } else if let Some((m, v)) = requirement(rest) {
                deps.insert(m, v);
            }
        }
        if in_block {
            return Err(ManifestError::Malformed("unterminated require block".into()));
        }
        Ok(deps)
    }
}
