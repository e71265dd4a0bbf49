//! Stack facts: frameworks, libraries and source-tree conventions.
//!
//! Stack detection is somebody else's job. GRK reads the result from
//! `.grounded/stack.json`:
//!
//! ```json
//! {
//!   "languages": ["PHP"],
//!   "frameworks": ["Laravel"],
//!   "libraries": ["sanctum"],
//!   "conventions": [
//!     { "role": "controllers", "path": "app/Http/Controllers" },
//!     { "role": "models", "path": "app/Models" }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::GrkError;

/// A source-tree convention: where files of some role live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathConvention {
    /// Role of the files (e.g., "controllers", "models", "routes").
    pub role: String,
    /// Project-relative directory.
    pub path: String,
}

/// Detected technology stack of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFacts {
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub libraries: Vec<String>,
    #[serde(default)]
    pub conventions: Vec<PathConvention>,
}

impl StackFacts {
    /// Load stack facts, or empty facts when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, GrkError> {
        if !path.exists() {
            tracing::debug!("No stack facts at {}", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| GrkError::StackLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| GrkError::StackLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
            && self.frameworks.is_empty()
            && self.libraries.is_empty()
            && self.conventions.is_empty()
    }

    /// Lowercase terms a query can mention to refer to this stack.
    pub fn vocabulary(&self) -> Vec<String> {
        let mut terms: Vec<String> = self
            .languages
            .iter()
            .chain(&self.frameworks)
            .chain(&self.libraries)
            .map(|t| t.to_lowercase())
            .chain(self.conventions.iter().map(|c| c.role.to_lowercase()))
            .collect();
        terms.sort();
        terms.dedup();
        terms
    }

    /// Conventions whose role or directory matches one of `terms`.
    ///
    /// Roles match their singular form too (`controller` → `controllers`).
    pub fn conventions_for<'a>(&'a self, terms: &[String]) -> Vec<&'a PathConvention> {
        self.conventions
            .iter()
            .filter(|c| {
                let role = c.role.to_lowercase();
                let singular = role.trim_end_matches('s');
                let dir = c.path.to_lowercase();
                terms.iter().any(|t| {
                    let t = t.to_lowercase();
                    t == role || t == singular || t.trim_end_matches('s') == singular || dir.ends_with(&t)
                })
            })
            .collect()
    }

    /// One-paragraph summary for prompts.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.languages.is_empty() {
            parts.push(format!("Languages: {}", self.languages.join(", ")));
        }
        if !self.frameworks.is_empty() {
            parts.push(format!("Frameworks: {}", self.frameworks.join(", ")));
        }
        if !self.libraries.is_empty() {
            parts.push(format!("Libraries: {}", self.libraries.join(", ")));
        }
        if !self.conventions.is_empty() {
            let conv: Vec<String> = self
                .conventions
                .iter()
                .map(|c| format!("{} in {}", c.role, c.path))
                .collect();
            parts.push(format!("Conventions: {}", conv.join("; ")));
        }
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn laravel() -> StackFacts {
        StackFacts {
            languages: vec!["PHP".to_string()],
            frameworks: vec!["Laravel".to_string()],
            libraries: vec!["Sanctum".to_string()],
            conventions: vec![
                PathConvention {
                    role: "controllers".to_string(),
                    path: "app/Http/Controllers".to_string(),
                },
                PathConvention {
                    role: "models".to_string(),
                    path: "app/Models".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_load_missing_and_present() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stack.json");
        assert!(StackFacts::load(&path).unwrap().is_empty());

        fs::write(&path, serde_json::to_string(&laravel()).unwrap()).unwrap();
        assert_eq!(StackFacts::load(&path).unwrap(), laravel());
    }

    #[test]
    fn test_load_malformed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stack.json");
        fs::write(&path, "{ frameworks: ").unwrap();
        assert!(matches!(
            StackFacts::load(&path),
            Err(GrkError::StackLoad { .. })
        ));
    }

    #[test]
    fn test_vocabulary_and_conventions() {
        let stack = laravel();
        let vocab = stack.vocabulary();
        assert!(vocab.contains(&"laravel".to_string()));
        assert!(vocab.contains(&"controllers".to_string()));

        let found = stack.conventions_for(&["controller".to_string()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "app/Http/Controllers");
        assert!(stack.conventions_for(&["views".to_string()]).is_empty());
    }

    #[test]
    fn test_summary() {
        let summary = laravel().summary();
        assert!(summary.contains("Frameworks: Laravel"));
        assert!(summary.contains("controllers in app/Http/Controllers"));
        assert_eq!(StackFacts::default().summary(), "");
    }
}
