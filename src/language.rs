use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use ignore::WalkBuilder;
use serde::Serialize;

/// Primary language tags recognized by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Java,
    Go,
    Rust,
    Unknown,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Java => "java",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Fixed tie-break order when two languages share the largest byte count
/// (§4.3): `go < rust < java < typescript < javascript < python`, read as
/// "python wins ties over javascript", etc. Encoded as a rank: higher wins.
fn tie_break_rank(language: Language) -> u8 {
    match language {
        Language::Go => 0,
        Language::Rust => 1,
        Language::Java => 2,
        Language::Typescript => 3,
        Language::Javascript => 4,
        Language::Python => 5,
        Language::Unknown => 255,
    }
}

const EXCLUDED_DIRS: &[&str] = &["node_modules", "vendor", "target", "build", "dist", ".git"];

fn language_for_extension(ext: &str) -> Option<Language> {
    match ext.to_lowercase().as_str() {
        "py" | "pyi" => Some(Language::Python),
        "js" | "mjs" | "cjs" | "jsx" => Some(Language::Javascript),
        "ts" | "tsx" | "mts" | "cts" => Some(Language::Typescript),
        "java" => Some(Language::Java),
        "go" => Some(Language::Go),
        "rs" => Some(Language::Rust),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub primary: Language,
    pub distribution: HashMap<Language, f64>,
}

/// Walk the working tree, tally bytes by recognized file extension, and pick
/// the byte-majority language. Never fails; an all-unrecognized tree yields
/// `Language::Unknown` with an empty distribution.
pub fn detect(root: &Path) -> DetectionResult {
    let mut bytes_by_language: HashMap<Language, u64> = HashMap::new();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !EXCLUDED_DIRS.contains(&name))
                .unwrap_or(true)
        })
        .build();

    for entry in walker.flatten() {
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let Some(language) = language_for_extension(ext) else {
            continue;
        };
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        *bytes_by_language.entry(language).or_insert(0) += size;
    }

    let total: u64 = bytes_by_language.values().sum();
    if total == 0 {
        return DetectionResult {
            primary: Language::Unknown,
            distribution: HashMap::new(),
        };
    }

    let primary = bytes_by_language
        .iter()
        .max_by(|a, b| {
            a.1.cmp(b.1)
                .then_with(|| tie_break_rank(*a.0).cmp(&tie_break_rank(*b.0)))
        })
        .map(|(lang, _)| *lang)
        .unwrap_or(Language::Unknown);

    let distribution = bytes_by_language
        .into_iter()
        .map(|(lang, bytes)| (lang, bytes as f64 / total as f64))
        .collect();

    DetectionResult {
        primary,
        distribution,
    }
}
