//! Prompt construction for the analysis endpoints.

use std::collections::BTreeMap;
use std::fmt::Write;

use super::filter::truncate_at_char_boundary;

/// Samples embedded per language.
pub const SAMPLES_PER_LANGUAGE: usize = 5;
/// Bytes of each sample embedded in the prompt.
pub const PROMPT_SAMPLE_BYTES: usize = 3_000;

/// One fetched file.
#[derive(Debug, Clone)]
pub struct FileSample {
    pub path: String,
    pub language: &'static str,
    pub content: String,
}

const CODEBASE_SCHEMA: &str = r#"{
  "overallSeverity": "low|medium|high|critical",
  "modernizationScore": 0,
  "summary": "string",
  "criticalIssues": [{"type": "string", "severity": "string", "file": "string", "issue": "string", "location": "string", "impact": "string", "recommendation": "string", "codeExample": "string"}],
  "deprecatedPatterns": [{"pattern": "string", "count": 0, "files": ["string"], "description": "string", "replacement": "string", "migrationComplexity": "low|medium|high"}],
  "securityVulnerabilities": [{"type": "string", "severity": "string", "file": "string", "line": "string", "description": "string", "cve": "string", "fix": "string", "codeExample": "string"}],
  "codeQualityIssues": [{"type": "string", "severity": "string", "file": "string", "issue": "string", "recommendation": "string"}],
  "modernizationRecommendations": [{"priority": "string", "category": "string", "description": "string", "estimatedEffort": "string", "filesAffected": ["string"], "steps": ["string"]}],
  "technicalDebt": {"estimatedDays": 0, "priority": "string", "risk": "string", "breakdown": {"security": "string", "deprecated": "string", "refactoring": "string"}}
}"#;

const DEPENDENCY_SCHEMA: &str = r#"{
  "overallSeverity": "low|medium|high|critical",
  "modernizationScore": 0,
  "summary": "string",
  "analysis": {"totalDependencies": 0, "outdatedCount": 0, "vulnerableCount": 0, "deprecatedCount": 0},
  "dependencies": [{"name": "string", "currentVersion": "string", "latestVersion": "string", "status": "up-to-date|outdated|deprecated|vulnerable", "securityIssues": ["string"], "breakingChanges": ["string"], "upgradePath": "string", "recommendation": "string", "upgradeSteps": ["string"]}],
  "upgradePlan": {"priorityOrder": ["string"], "groupedUpgrades": {"safe": ["string"], "requiresTesting": ["string"], "breaking": ["string"]}, "estimatedRisk": "string", "testingRequired": ["string"]}
}"#;

const STRICT_JSON: &str = "Respond ONLY with a single JSON object matching this schema. \
Do not add commentary before or after it. \
modernizationScore is an integer from 0 (legacy) to 100 (fully modern).";

/// Sorted language names present in `samples`.
pub fn languages(samples: &[FileSample]) -> Vec<&'static str> {
    let mut langs: Vec<&'static str> = samples.iter().map(|s| s.language).collect();
    langs.sort_unstable();
    langs.dedup();
    langs
}

pub fn codebase_prompt(repository: &str, branch: &str, samples: &[FileSample]) -> String {
    let mut by_language: BTreeMap<&str, Vec<&FileSample>> = BTreeMap::new();
    for sample in samples {
        by_language.entry(sample.language).or_default().push(sample);
    }

    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are a senior software modernization consultant. Analyze the following \
         code samples from the repository {repository} (branch {branch}) and identify \
         legacy patterns, deprecated APIs, security vulnerabilities, code quality \
         problems and concrete modernization steps."
    );
    let _ = writeln!(
        prompt,
        "\nLanguages: {}",
        by_language.keys().copied().collect::<Vec<_>>().join(", ")
    );

    for (language, files) in &by_language {
        let _ = writeln!(prompt, "\n## {language} files");
        for sample in files.iter().take(SAMPLES_PER_LANGUAGE) {
            let code = truncate_at_char_boundary(&sample.content, PROMPT_SAMPLE_BYTES);
            let _ = writeln!(prompt, "\n### {}\n```{language}\n{code}\n```", sample.path);
        }
    }

    let _ = writeln!(prompt, "\n{STRICT_JSON}\n{CODEBASE_SCHEMA}");
    prompt
}

/// Prompt for a name → version dependency list.
pub fn dependency_prompt(
    language: &str,
    package_manager: Option<&str>,
    dependencies: &BTreeMap<String, String>,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are a dependency management expert. Analyze these {language} dependencies{} \
         for outdated versions, known security vulnerabilities, deprecated packages and \
         breaking changes, and propose a safe upgrade plan.\n",
        package_manager
            .map(|pm| format!(" managed with {pm}"))
            .unwrap_or_default()
    );
    for (name, version) in dependencies {
        let _ = writeln!(prompt, "- {name}: {version}");
    }
    let _ = writeln!(prompt, "\n{STRICT_JSON}\n{DEPENDENCY_SCHEMA}");
    prompt
}

pub fn modernize_prompt(code: &str, language: &str, target_version: Option<&str>) -> String {
    format!(
        "You are an expert code modernization assistant. Please provide recommendations \
         to modernize the following {language} code.\n\n\
         Target: {}\n\
         Current code:\n```{language}\n{code}\n```\n\n\
         Provide:\n\
         1. A brief explanation of deprecated patterns in the code\n\
         2. Modern replacement recommendations\n\
         3. Example of modernized code\n\n\
         Be concise and practical.",
        target_version.unwrap_or("modern version")
    )
}

pub fn compare_prompt(old_pattern: &str, new_pattern: &str, language: &str) -> String {
    format!(
        "Compare these two code patterns in {language} and explain the benefits of the \
         modern approach:\n\n\
         OLD PATTERN:\n```{language}\n{old_pattern}\n```\n\n\
         NEW PATTERN:\n```{language}\n{new_pattern}\n```\n\n\
         Provide a comparison highlighting:\n\
         1. What makes the old pattern outdated\n\
         2. Benefits of the new pattern\n\
         3. Potential issues the old pattern might have"
    )
}

pub fn summarize_prompt(text: &str) -> String {
    format!("Summarize the following text in a concise manner:\n\n{text}")
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample(path: &str, language: &'static str, content: &str) -> FileSample {
        FileSample {
            path: path.into(),
            language,
            content: content.into(),
        }
    }

    #[test]
    fn languages_are_sorted_and_unique() {
        let samples = vec![
            sample("a.py", "python", ""),
            sample("b.java", "java", ""),
            sample("c.py", "python", ""),
        ];
        assert_eq!(languages(&samples), vec!["java", "python"]);
    }

    #[test]
    fn caps_samples_per_language() {
        let samples: Vec<_> = (0..7)
            .map(|i| sample(&format!("f{i}.py"), "python", "x = 1"))
            .collect();
        let prompt = codebase_prompt("octo/legacy", "main", &samples);
        assert!(prompt.contains("### f4.py"));
        assert!(!prompt.contains("### f5.py"));
    }

    #[test]
    fn truncates_each_sample() {
        let big = "y".repeat(PROMPT_SAMPLE_BYTES + 500);
        let prompt = codebase_prompt("octo/legacy", "main", &[sample("big.py", "python", &big)]);
        assert!(prompt.contains(&"y".repeat(PROMPT_SAMPLE_BYTES)));
        assert!(!prompt.contains(&"y".repeat(PROMPT_SAMPLE_BYTES + 1)));
    }

    #[test]
    fn language_sections_follow_name_order() {
        let samples = vec![sample("a.py", "python", "p"), sample("b.go", "go", "g")];
        let prompt = codebase_prompt("octo/legacy", "main", &samples);
        let go = prompt.find("## go files").unwrap();
        let py = prompt.find("## python files").unwrap();
        assert!(go < py);
        assert!(prompt.contains("modernizationScore"));
    }

    #[test]
    fn dependency_prompt_lists_pairs() {
        let deps = BTreeMap::from([
            ("express".to_string(), "4.17.1".to_string()),
            ("lodash".to_string(), "4.17.15".to_string()),
        ]);
        let prompt = dependency_prompt("javascript", Some("npm"), &deps);
        assert!(prompt.contains("- express: 4.17.1"));
        assert!(prompt.contains("managed with npm"));
    }

    #[test]
    fn modernize_defaults_target() {
        assert!(modernize_prompt("x", "java", None).contains("Target: modern version"));
    }
}
