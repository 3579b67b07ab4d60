use std::sync::OnceLock;

use regex::Regex;

use super::{Dependencies, ManifestError, ManifestParser, UNSPECIFIED};

/// SDK-style `*.csproj` `<PackageReference>` items.
#[derive(Debug, Clone, Copy)]
pub struct CsprojManifest;

struct Patterns {
    reference: Regex,
    include: Regex,
    version_attr: Regex,
    version_elem: Regex,
}

fn patterns() -> &'static Patterns {
    static RE: OnceLock<Patterns> = OnceLock::new();
    RE.get_or_init(|| Patterns {
        reference: Regex::new(r"(?s)<PackageReference\b([^>]*?)(?:/>|>(.*?)</PackageReference>)")
            .expect("reference regex compiles"),
        include: Regex::new(r#"\bInclude\s*=\s*"([^"]+)""#).expect("include regex compiles"),
        version_attr: Regex::new(r#"\bVersion\s*=\s*"([^"]*)""#).expect("version regex compiles"),
        version_elem: Regex::new(r"(?s)<Version>\s*(.*?)\s*</Version>").expect("version element regex compiles"),
    })
}

impl ManifestParser for CsprojManifest {
    fn language(&self) -> &'static str {
        "csharp"
    }

    fn package_manager(&self) -> &'static str {
        "nuget"
    }

    fn matches(&self, file_name: &str) -> bool {
        file_name.to_ascii_lowercase().ends_with(".csproj")
    }

    fn parse(&self, content: &str) -> Result<Dependencies, ManifestError> {
        if !content.contains("<Project") {
            return Err(ManifestError::Malformed("missing <Project> element".into()));
        }
        let p = patterns();
        let mut deps = Dependencies::new();
        for caps in p.reference.captures_iter(content) {
            let attrs = &caps[1];
            let Some(name) = p.include.captures(attrs).map(|c| c[1].to_owned()) else {
                continue;
            };
            let version = p
                .version_attr
                .captures(attrs)
                .or_else(|| caps.get(2).and_then(|body| p.version_elem.captures(body.as_str())))
                .map(|c| c[1].trim().to_owned())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| UNSPECIFIED.to_owned());
            deps.insert(name, version);
        }
        Ok(deps)
    }
}
