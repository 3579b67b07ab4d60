//! File selection for codebase analysis: exclusions, extension allow-list
//! and language detection.

use std::collections::BTreeSet;

use lmra_fetch::TreeEntry;

/// Directories skipped in every analysis.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "target",
    "vendor",
    "bin",
    "obj",
    "__pycache__",
    ".next",
    "coverage",
    ".idea",
    ".vscode",
    ".venv",
    "venv",
    "packages",
];

/// Files above this size are never sampled.
pub const MAX_FILE_BYTES: u64 = 100_000;

/// Language name and the extensions that identify it.
const LANGUAGES: &[(&str, &[&str])] = &[
    ("c", &["c", "h"]),
    ("cobol", &["cbl", "cob"]),
    ("cpp", &["cpp", "cc", "cxx", "hpp", "hh"]),
    ("csharp", &["cs"]),
    ("go", &["go"]),
    ("java", &["java"]),
    ("javascript", &["js", "jsx", "mjs", "cjs"]),
    ("kotlin", &["kt", "kts"]),
    ("perl", &["pl", "pm"]),
    ("php", &["php"]),
    ("python", &["py"]),
    ("ruby", &["rb"]),
    ("rust", &["rs"]),
    ("scala", &["scala"]),
    ("sql", &["sql"]),
    ("swift", &["swift"]),
    ("typescript", &["ts", "tsx"]),
    ("vb", &["vb"]),
];

fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Language of a file, by extension.
pub fn detect_language(path: &str) -> Option<&'static str> {
    let ext = extension_of(path)?;
    LANGUAGES
        .iter()
        .find(|(_, exts)| exts.contains(&ext.as_str()))
        .map(|(lang, _)| *lang)
}

/// Canonical language name for a user-supplied label.
pub fn normalize_language(label: &str) -> Option<&'static str> {
    let label = label.trim().to_ascii_lowercase();
    let canonical = match label.as_str() {
        "c#" | "cs" | "dotnet" | ".net" => "csharp",
        "c++" => "cpp",
        "js" | "node" | "nodejs" => "javascript",
        "ts" => "typescript",
        "py" => "python",
        "golang" => "go",
        "rb" => "ruby",
        "vb.net" | "visualbasic" => "vb",
        other => other,
    };
    LANGUAGES
        .iter()
        .find(|(lang, _)| *lang == canonical)
        .map(|(lang, _)| *lang)
}

pub fn supported_languages() -> impl Iterator<Item = &'static str> {
    LANGUAGES.iter().map(|(lang, _)| *lang)
}

fn extensions_for(language: &str) -> impl Iterator<Item = &'static str> {
    LANGUAGES
        .iter()
        .filter(move |(lang, _)| *lang == language)
        .flat_map(|(_, exts)| exts.iter().copied())
}

#[derive(Debug, Clone)]
pub struct FileFilter {
    excludes: Vec<String>,
    extensions: BTreeSet<String>,
}

impl FileFilter {
    /// Build the filter.  The extension allow-list is `file_extensions` when
    /// given, else the extensions of `language`, else every known extension.
    pub fn new(
        language: Option<&str>,
        file_extensions: &[String],
        exclude_paths: &[String],
    ) -> Self {
        let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| (*s).to_owned()).collect();
        excludes.extend(
            exclude_paths
                .iter()
                .map(|p| p.trim().trim_matches('/').to_owned())
                .filter(|p| !p.is_empty()),
        );

        let explicit: BTreeSet<String> = file_extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        let extensions = if !explicit.is_empty() {
            explicit
        } else if let Some(lang) = language {
            extensions_for(lang).map(str::to_owned).collect()
        } else {
            LANGUAGES
                .iter()
                .flat_map(|(_, exts)| exts.iter().map(|e| (*e).to_owned()))
                .collect()
        };

        Self { excludes, extensions }
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        let dirs: Vec<&str> = match path.rsplit_once('/') {
            Some((dir, _)) => dir.split('/').collect(),
            None => Vec::new(),
        };
        self.excludes.iter().any(|ex| {
            if ex.contains('/') {
                path.starts_with(&format!("{ex}/")) || path.contains(&format!("/{ex}/"))
            } else {
                dirs.contains(&ex.as_str())
            }
        })
    }

    pub fn accepts(&self, entry: &TreeEntry) -> bool {
        entry.size <= MAX_FILE_BYTES
            && !self.is_excluded(&entry.path)
            && extension_of(&entry.path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Accepted entries in listing order, at most `max_files`.
    pub fn select(&self, entries: &[TreeEntry], max_files: usize) -> Vec<TreeEntry> {
        entries
            .iter()
            .filter(|e| self.accepts(e))
            .take(max_files)
            .cloned()
            .collect()
    }
}

/// Longest prefix of `s` no longer than `max` bytes, cut at a char boundary.
pub fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
