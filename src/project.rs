//! Project identity.
//!
//! Every message carries a stable `project-id` so a browser connected to
//! several dev servers can tell them apart. The id comes from, in order:
//! the `unique-id` config override, the project manifest's name and version,
//! or the canonical path of the working tree.

use std::fs;
use std::path::Path;

use crate::utils::path::forward_slashes;

/// Manifest file consulted for the name--version form of the project id.
pub const PROJECT_MANIFEST: &str = "project.clj";

/// Derive the project id for a working tree.
pub fn project_id(root: &Path, unique_id: Option<&str>) -> String {
    if let Some(id) = unique_id {
        return id.to_string();
    }

    fs::read_to_string(root.join(PROJECT_MANIFEST))
        .ok()
        .and_then(|source| manifest_project_id(&source))
        .unwrap_or_else(|| forward_slashes(root))
}

/// Extract `name + "--" + version` from a manifest whose first form is
/// `(defproject <name> "<version>" ...)`. Returns `None` when the form is
/// absent or malformed.
pub fn manifest_project_id(source: &str) -> Option<String> {
    let mut reader = FormReader::new(source);
    reader.expect_open()?;
    if reader.symbol()? != "defproject" {
        return None;
    }
    let name = reader.symbol()?;
    let version = reader.string()?;
    Some(format!("{name}--{version}"))
}

/// Minimal reader over the leading tokens of a Lisp-style form. Comments
/// (`;` to end of line) and whitespace (including commas) are skipped.
struct FormReader<'a> {
    rest: &'a str,
}

impl<'a> FormReader<'a> {
    fn new(source: &'a str) -> Self {
        Self { rest: source }
    }

    fn skip_trivia(&mut self) {
        loop {
            self.rest = self.rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
            if let Some(stripped) = self.rest.strip_prefix(';') {
                self.rest = stripped.split_once('\n').map_or("", |(_, rest)| rest);
            } else {
                return;
            }
        }
    }

    fn expect_open(&mut self) -> Option<()> {
        self.skip_trivia();
        self.rest = self.rest.strip_prefix('(')?;
        Some(())
    }

    fn symbol(&mut self) -> Option<&'a str> {
        self.skip_trivia();
        let end = self
            .rest
            .find(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '"' | ',' | ';'))
            .unwrap_or(self.rest.len());
        if end == 0 {
            return None;
        }
        let (symbol, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(symbol)
    }

    fn string(&mut self) -> Option<&'a str> {
        self.skip_trivia();
        let body = self.rest.strip_prefix('"')?;
        let end = body.find('"')?;
        self.rest = &body[end + 1..];
        Some(&body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_name_and_version() {
        let source = r#"(defproject example-app "0.1.0-SNAPSHOT"
  :description "example")"#;
        assert_eq!(
            manifest_project_id(source),
            Some("example-app--0.1.0-SNAPSHOT".to_string())
        );
    }

    #[test]
    fn test_manifest_namespaced_name() {
        let source = r#"(defproject org.example/app "1.2.3")"#;
        assert_eq!(manifest_project_id(source), Some("org.example/app--1.2.3".to_string()));
    }

    #[test]
    fn test_manifest_with_leading_comment() {
        let source = ";; build definition\n(defproject app \"0.2.0\")";
        assert_eq!(manifest_project_id(source), Some("app--0.2.0".to_string()));
    }

    #[test]
    fn test_manifest_malformed() {
        assert_eq!(manifest_project_id("not a manifest"), None);
        assert_eq!(manifest_project_id("(defsomething app \"1.0\")"), None);
        assert_eq!(manifest_project_id("(defproject app :version)"), None);
        assert_eq!(manifest_project_id(""), None);
    }

    #[test]
    fn test_unique_id_wins() {
        let id = project_id(Path::new("/tmp"), Some("custom-id"));
        assert_eq!(id, "custom-id");
    }

    #[test]
    fn test_manifest_file_used() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(PROJECT_MANIFEST), "(defproject demo \"0.9.1\")").unwrap();
        assert_eq!(project_id(dir.path(), None), "demo--0.9.1");
    }

    #[test]
    fn test_fallback_to_root_path() {
        let root = PathBuf::from("/some/project/root");
        assert_eq!(project_id(&root, None), "/some/project/root");
    }
}
