use super::{Dependencies, ManifestError, ManifestParser, UNSPECIFIED};

/// `requirements.txt`.
#[derive(Debug, Clone, Copy)]
pub struct Requirements;

const OPERATORS: &[&str] = &["===", "==", ">=", "<=", "~=", "!=", ">", "<"];

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.split(" #").next().unwrap_or(line);
    // Environment markers: `pkg==1.0; python_version < "3.8"`.
    let line = line.split(';').next().unwrap_or(line).trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('-') || line.contains("://") {
        return None;
    }

    let split = OPERATORS
        .iter()
        .filter_map(|op| line.find(op).map(|at| (at, *op)))
        .min_by_key(|(at, op)| (*at, std::cmp::Reverse(op.len())));

    let (name, version) = match split {
        Some((at, op)) => {
            let spec = line[at..].trim();
            let version = if op == "==" || op == "===" {
                spec[op.len()..].trim().to_owned()
            } else {
                spec.to_owned()
            };
            (&line[..at], version)
        }
        None => (line, UNSPECIFIED.to_owned()),
    };

    // Drop extras: `requests[security]`.
    let name = name.split('[').next().unwrap_or(name).trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_owned(), version))
}

impl ManifestParser for Requirements {
    fn language(&self) -> &'static str {
        "python"
    }

    fn package_manager(&self) -> &'static str {
        "pip"
    }

    fn matches(&self, file_name: &str) -> bool {
        file_name == "requirements.txt"
    }

    fn parse(&self, content: &str) -> Result<Dependencies, ManifestError> {
        Ok(content.lines().filter_map(parse_line).collect())
    }
}
