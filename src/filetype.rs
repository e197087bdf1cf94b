//! Maps basenames and extensions to the logical types the rule engine
//! indexes on.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Markdown,
    Json,
    Manifest,
    Python,
    Typescript,
    Javascript,
    Bash,
    Binary,
    Text,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Markdown => "markdown",
            FileType::Json => "json",
            FileType::Manifest => "manifest",
            FileType::Python => "python",
            FileType::Typescript => "typescript",
            FileType::Javascript => "javascript",
            FileType::Bash => "bash",
            FileType::Binary => "binary",
            FileType::Text => "text",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "markdown" => Some(FileType::Markdown),
            "json" => Some(FileType::Json),
            "manifest" => Some(FileType::Manifest),
            "python" => Some(FileType::Python),
            "typescript" => Some(FileType::Typescript),
            "javascript" => Some(FileType::Javascript),
            "bash" => Some(FileType::Bash),
            "binary" => Some(FileType::Binary),
            "text" => Some(FileType::Text),
            _ => None,
        }
    }

    pub fn all() -> [FileType; 9] {
        [
            FileType::Markdown,
            FileType::Json,
            FileType::Manifest,
            FileType::Python,
            FileType::Typescript,
            FileType::Javascript,
            FileType::Bash,
            FileType::Binary,
            FileType::Text,
        ]
    }

    /// Detect the logical type for a path. Basename anchors win over
    /// extensions; anything unrecognized is treated as plain text.
    pub fn detect(path: &Path) -> FileType {
        let basename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_lowercase();

        match basename.as_str() {
            "skill.md" => return FileType::Markdown,
            "manifest.json" => return FileType::Manifest,
            "package.json" => return FileType::Json,
            _ => {}
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        match ext.as_str() {
            "md" | "mdx" | "txt" | "rst" => FileType::Markdown,
            // Config formats scan well under the markdown prose rules.
            "yaml" | "yml" | "toml" | "ini" | "cfg" | "conf" => FileType::Markdown,
            "json" => FileType::Json,
            "py" => FileType::Python,
            "ts" | "tsx" => FileType::Typescript,
            "js" | "mjs" | "cjs" | "jsx" => FileType::Javascript,
            "sh" | "bash" => FileType::Bash,
            // Close-enough C-like syntax for pattern matching purposes.
            "c" | "h" | "cpp" | "cc" | "hpp" | "go" | "java" | "rs" | "kt" | "swift" | "rb" => {
                FileType::Python
            }
            "exe" | "bin" | "dll" | "so" | "dylib" | "jar" => FileType::Binary,
            _ => FileType::Text,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Packed extension archives are never unpacked or scanned.
pub fn is_archive(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
        "crx" | "xpi" | "zip"
    )
}
