//! Per-skill bundled files: `references/` (documentation the skill may
//! consult) and `assets/` (templates and data).

use serde::Serialize;
use skillkit_core::{Result, SkillkitError};
use std::path::{Path, PathBuf};

use crate::descriptor::SkillDescriptor;

const REFERENCES_DIR: &str = "references";
const ASSETS_DIR: &str = "assets";
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "json", "yaml", "yml", "csv"];

/// Sorted file names available to a skill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceListing {
    pub references: Vec<String>,
    pub assets: Vec<String>,
}

impl ResourceListing {
    pub fn is_empty(&self) -> bool {
        self.references.is_empty() && self.assets.is_empty()
    }
}

impl std::fmt::Display for ResourceListing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No resources available");
        }
        let mut sections = Vec::new();
        for (title, names) in [("References", &self.references), ("Assets", &self.assets)] {
            if names.is_empty() {
                continue;
            }
            let mut s = format!("{title}:");
            for n in names {
                s.push_str(&format!("\n  - {n}"));
            }
            sections.push(s);
        }
        write!(f, "{}", sections.join("\n\n"))
    }
}

/// Contents of an asset file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetContent {
    Text { text: String },
    Binary { filename: String, size: u64 },
}

impl std::fmt::Display for AssetContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetContent::Text { text } => write!(f, "{text}"),
            AssetContent::Binary { filename, size } => {
                write!(f, "Asset file (binary): {filename}, size: {size} bytes")
            }
        }
    }
}

impl SkillDescriptor {
    pub fn references_dir(&self) -> PathBuf {
        self.base_dir.join(REFERENCES_DIR)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.base_dir.join(ASSETS_DIR)
    }

    /// File names in `references/` and `assets/`, each sorted.
    pub fn list_resources(&self) -> Result<ResourceListing> {
        Ok(ResourceListing {
            references: file_names(&self.references_dir())?,
            assets: file_names(&self.assets_dir())?,
        })
    }

    /// Read a reference document as UTF-8 text.
    pub fn read_reference(&self, filename: &str) -> Result<String> {
        let path = self.resource_path(REFERENCES_DIR, filename)?;
        std::fs::read_to_string(&path).map_err(|e| self.resource_error(filename, e))
    }

    /// Read an asset: text for known text extensions, a size summary for
    /// anything else.
    pub fn read_asset(&self, filename: &str) -> Result<AssetContent> {
        let path = self.resource_path(ASSETS_DIR, filename)?;
        let is_text = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if is_text {
            let text = std::fs::read_to_string(&path).map_err(|e| self.resource_error(filename, e))?;
            Ok(AssetContent::Text { text })
        } else {
            let size = std::fs::metadata(&path)
                .map_err(|e| self.resource_error(filename, e))?
                .len();
            Ok(AssetContent::Binary {
                filename: filename.to_string(),
                size,
            })
        }
    }

    fn resource_path(&self, sub: &str, filename: &str) -> Result<PathBuf> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
        {
            return Err(SkillkitError::Resource {
                skill: self.name.clone(),
                reason: format!("invalid resource name '{filename}'"),
            });
        }
        let path = self.base_dir.join(sub).join(filename);
        if !path.is_file() {
            return Err(SkillkitError::Resource {
                skill: self.name.clone(),
                reason: format!("{sub}/{filename} not found"),
            });
        }
        Ok(path)
    }

    fn resource_error(&self, filename: &str, e: std::io::Error) -> SkillkitError {
        SkillkitError::Resource {
            skill: self.name.clone(),
            reason: format!("failed to read {filename}: {e}"),
        }
    }
}

fn file_names(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill_with_resources() -> (tempfile::TempDir, SkillDescriptor) {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("calendar-assistant");
        std::fs::create_dir_all(base.join("references")).unwrap();
        std::fs::create_dir_all(base.join("assets")).unwrap();
        std::fs::write(base.join("references/rfc5545.md"), "# iCalendar").unwrap();
        std::fs::write(base.join("references/examples.txt"), "examples").unwrap();
        std::fs::write(base.join("assets/template.json"), "{\"a\":1}").unwrap();
        std::fs::write(base.join("assets/logo.png"), [0u8; 42]).unwrap();
        std::fs::write(base.join("SKILL.md"), "---\nname: calendar-assistant\ndescription: d\n---\n").unwrap();
        let d = SkillDescriptor::from_file(&base.join("SKILL.md")).unwrap();
        (dir, d)
    }

    #[test]
    fn test_lists_sorted_resources() {
        let (_dir, d) = skill_with_resources();
        let listing = d.list_resources().unwrap();
        assert_eq!(listing.references, vec!["examples.txt", "rfc5545.md"]);
        assert_eq!(listing.assets, vec!["logo.png", "template.json"]);
        let rendered = listing.to_string();
        assert!(rendered.starts_with("References:\n  - examples.txt"));
        assert!(rendered.contains("Assets:\n  - logo.png"));
    }

    #[test]
    fn test_reads_reference_and_assets() {
        let (_dir, d) = skill_with_resources();
        assert_eq!(d.read_reference("rfc5545.md").unwrap(), "# iCalendar");
        assert_eq!(
            d.read_asset("template.json").unwrap(),
            AssetContent::Text { text: "{\"a\":1}".into() }
        );
        let bin = d.read_asset("logo.png").unwrap();
        assert_eq!(bin.to_string(), "Asset file (binary): logo.png, size: 42 bytes");
    }

    #[test]
    fn test_rejects_traversal_and_missing() {
        let (_dir, d) = skill_with_resources();
        assert_eq!(d.read_reference("../SKILL.md").unwrap_err().kind(), "resource");
        assert!(d.read_asset("sub/file.txt").is_err());
        assert!(d.read_reference("nope.md").unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_no_resources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("SKILL.md"), "---\nname: bare\ndescription: d\n---\n").unwrap();
        let d = SkillDescriptor::from_file(&dir.path().join("SKILL.md")).unwrap();
        let listing = d.list_resources().unwrap();
        assert!(listing.is_empty());
        assert_eq!(listing.to_string(), "No resources available");
    }
}
