use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use super::{Dependencies, ManifestError, ManifestParser, UNSPECIFIED};

/// Maven `pom.xml`.  `${property}` versions are resolved from the
/// `<properties>` section; unresolvable ones become [`UNSPECIFIED`].
#[derive(Debug, Clone, Copy)]
pub struct MavenPom;

struct Patterns {
    properties: Regex,
    property: Regex,
    dependency: Regex,
    placeholder: Regex,
    comment: Regex,
}

fn patterns() -> &'static Patterns {
    static RE: OnceLock<Patterns> = OnceLock::new();
    RE.get_or_init(|| Patterns {
        properties: Regex::new(r"(?s)<properties>(.*?)</properties>").expect("properties regex compiles"),
        property: Regex::new(r"(?s)<([A-Za-z0-9_.\-]+)>\s*([^<]*?)\s*</([A-Za-z0-9_.\-]+)>")
            .expect("property regex compiles"),
        dependency: Regex::new(r"(?s)<dependency>(.*?)</dependency>").expect("dependency regex compiles"),
        placeholder: Regex::new(r"\$\{([^}]+)\}").expect("placeholder regex compiles"),
        comment: Regex::new(r"(?s)<!--.*?-->").expect("comment regex compiles"),
    })
}

fn tag<'a>(block: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = block.find(&open)? + open.len();
    let end = block[start..].find(&close)? + start;
    Some(block[start..end].trim())
}

fn resolve(version: &str, properties: &HashMap<String, String>) -> String {
    let p = patterns();
    let mut unresolved = false;
    let resolved = p.placeholder.replace_all(version, |caps: &regex::Captures<'_>| {
        match properties.get(&caps[1]) {
            Some(v) => v.clone(),
            None => {
                unresolved = true;
                String::new()
            }
        }
    });
    if unresolved || resolved.trim().is_empty() {
        UNSPECIFIED.to_owned()
    } else {
        resolved.into_owned()
    }
}

impl ManifestParser for MavenPom {
    fn language(&self) -> &'static str {
        "java"
    }

    fn package_manager(&self) -> &'static str {
        "maven"
    }

    fn matches(&self, file_name: &str) -> bool {
        file_name == "pom.xml"
    }

    fn parse(&self, content: &str) -> Result<Dependencies, ManifestError> {
        let p = patterns();
        let content = p.comment.replace_all(content, "");
        if !content.contains("<project") {
            return Err(ManifestError::Malformed("missing <project> element".into()));
        }

        let mut properties = HashMap::new();
        for section in p.properties.captures_iter(&content) {
            for prop in p.property.captures_iter(&section[1]) {
                if prop[1] == prop[3] {
                    properties.insert(prop[1].to_owned(), prop[2].to_owned());
                }
            }
        }

        let mut deps = Dependencies::new();
        for dep in p.dependency.captures_iter(&content) {
            let block = &dep[1];
            let (Some(group), Some(artifact)) = (tag(block, "groupId"), tag(block, "artifactId"))
            else {
                continue;
            };
            let version = tag(block, "version")
                .map(|v| resolve(v, &properties))
                .unwrap_or_else(|| UNSPECIFIED.to_owned());
            deps.insert(format!("{group}:{artifact}"), version);
        }
        Ok(deps)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const POM: &str = r#"<?xml version="1.0"?>
<project>
  <properties>
    <spring.version>4.3.2.RELEASE</spring.version>
    <!-- <junit.version>3.8</junit.version> -->
  </properties>
  <dependencies>
    <dependency>
      <groupId>org.springframework</groupId>
      <artifactId>spring-core</artifactId>
      <version>${spring.version}</version>
    </dependency>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>${junit.version}</version>
    </dependency>
    <dependency>
      <groupId>log4j</groupId>
      <artifactId>log4j</artifactId>
      <version>1.2.17</version>
    </dependency>
    <dependency>
      <groupId>org.slf4j</groupId>
      <artifactId>slf4j-api</artifactId>
    </dependency>
  </dependencies>
</project>"#;

    #[test]
    fn resolves_known_properties() {
        let deps = MavenPom.parse(POM).unwrap();
        assert_eq!(deps["org.springframework:spring-core"], "4.3.2.RELEASE");
        assert_eq!(deps["log4j:log4j"], "1.2.17");
    }

    #[test]
    fn unknown_placeholders_become_unspecified() {
        let deps = MavenPom.parse(POM).unwrap();
        assert_eq!(deps["junit:junit"], UNSPECIFIED);
        assert_eq!(deps["org.slf4j:slf4j-api"], UNSPECIFIED);
        assert_eq!(deps.len(), 4);
    }

    #[test]
    fn not_a_pom() {
        assert!(MavenPom.parse("<settings/>").is_err());
    }
}
