use serde::{Deserialize, Serialize};
use skillkit_core::{Result, SkillkitError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A skill descriptor parsed from a SKILL.md file.
///
/// The front matter carries the metadata the router and front-ends need;
/// the Markdown body holds the full instructions, loaded only when the skill
/// is activated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    /// Skill name (from front matter or directory name).
    pub name: String,
    /// Short description shown in listings and the system prompt.
    pub description: String,
    pub version: String,
    pub tags: Vec<String>,
    /// Lower-cased trigger phrases, in declaration order.
    pub triggers: Vec<String>,
    pub capabilities: Vec<String>,
    pub author: Option<String>,
    pub license: Option<String>,
    /// Free-form permission block, kept for display only.
    pub permissions: Option<serde_json::Value>,
    pub environment: EnvironmentSpec,
    /// "generic" unless a config.yaml says otherwise.
    pub skill_type: String,
    /// Groups allowed to use the skill (empty = everyone).
    pub user_groups: Vec<String>,
    pub admin_groups: Vec<String>,
    /// Whether a non-empty config.yaml sits next to SKILL.md.
    pub has_config: bool,
    /// The Markdown body (instructions), with `{baseDir}` resolved.
    #[serde(skip)]
    pub body: String,
    #[serde(skip)]
    pub file_path: PathBuf,
    /// Directory holding SKILL.md, `references/` and `assets/`.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Environment variables a skill reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSpec {
    pub required: Vec<String>,
    /// Optional variables with their default values.
    pub optional: BTreeMap<String, serde_json::Value>,
}

impl EnvironmentSpec {
    /// Default value for an optional variable, rendered as a string.
    pub fn default_for(&self, var: &str) -> Option<String> {
        self.optional.get(var).map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Raw front matter as written in the file. Every key is optional here;
/// [`SkillDescriptor::parse`] enforces what must be present.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Frontmatter {
    name: Option<String>,
    description: Option<String>,
    version: Option<String>,
    tags: StringList,
    triggers: StringList,
    capabilities: StringList,
    author: Option<String>,
    license: Option<String>,
    permissions: Option<serde_json::Value>,
    environment: EnvironmentSpec,
    user_groups: StringList,
    admin_groups: StringList,
}

/// Optional `config.yaml` next to SKILL.md. Values set here win over the
/// front matter.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SkillConfig {
    name: Option<String>,
    description: Option<String>,
    skill_type: Option<String>,
    #[serde(alias = "user_groups")]
    user_group: StringList,
    #[serde(alias = "admin_groups")]
    admin_group: StringList,
}

pub const CONFIG_FILE: &str = "config.yaml";

/// A YAML list of strings, or one comma-separated string.
#[derive(Debug, Default)]
struct StringList(Vec<String>);

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
            Null(()),
        }
        let items = match Raw::deserialize(d)? {
            Raw::One(s) => s.split(',').map(str::to_string).collect(),
            Raw::Many(v) => v,
            Raw::Null(()) => vec![],
        };
        Ok(StringList(
            items
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ))
    }
}

impl SkillDescriptor {
    /// Parse a SKILL.md file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SkillkitError::Descriptor {
            path: path.display().to_string(),
            reason: format!("failed to read: {e}"),
        })?;
        let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let config_path = base_dir.join(CONFIG_FILE);
        let config = if config_path.is_file() {
            Some(std::fs::read_to_string(&config_path).map_err(|e| {
                SkillkitError::Descriptor {
                    path: config_path.display().to_string(),
                    reason: format!("failed to read: {e}"),
                }
            })?)
        } else {
            None
        };
        Self::parse_with_config(&content, config.as_deref(), path.to_path_buf(), base_dir)
    }

    /// Parse SKILL.md content with known path info.
    ///
    /// ```text
    /// ---
    /// name: calendar-assistant
    /// description: Create calendar events from plain language
    /// triggers: [calendar, meeting, schedule]
    /// ---
    ///
    /// # Calendar Assistant
    /// ...
    /// ```
    pub fn parse(content: &str, file_path: PathBuf, base_dir: PathBuf) -> Result<Self> {
        Self::parse_with_config(content, None, file_path, base_dir)
    }

    /// Parse SKILL.md content together with the text of its config.yaml.
    ///
    /// With a config present, SKILL.md may be plain Markdown; name,
    /// description, type and access groups are taken from the config first.
    pub fn parse_with_config(
        content: &str,
        config_yaml: Option<&str>,
        file_path: PathBuf,
        base_dir: PathBuf,
    ) -> Result<Self> {
        let invalid = |reason: String| SkillkitError::Descriptor {
            path: file_path.display().to_string(),
            reason,
        };

        let config: Option<SkillConfig> = match config_yaml.filter(|c| !c.trim().is_empty()) {
            Some(text) => Some(
                serde_yaml::from_str(text)
                    .map_err(|e| invalid(format!("bad {CONFIG_FILE}: {e}")))?,
            ),
            None => None,
        };
        let has_config = config.is_some();
        let config = config.unwrap_or_default();

        let (yaml, body) = match split_frontmatter(content) {
            Ok(parts) => parts,
            Err(_) if has_config => ("", content.trim()),
            Err(reason) => return Err(invalid(reason.into())),
        };
        let fm: Frontmatter = if yaml.trim().is_empty() {
            Frontmatter::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| invalid(format!("bad front matter: {e}")))?
        };

        let non_blank = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let name = non_blank(config.name)
            .or_else(|| non_blank(fm.name))
            .or_else(|| {
                base_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
            })
            .ok_or_else(|| invalid("skill name is empty".into()))?;

        let description = non_blank(config.description)
            .or_else(|| non_blank(fm.description))
            .unwrap_or_default();
        if description.is_empty() {
            return Err(invalid(format!("skill '{name}' has no description")));
        }

        let phrases = if fm.triggers.0.is_empty() { &fm.tags.0 } else { &fm.triggers.0 };
        let triggers = normalize_triggers(phrases);

        let body = body.replace("{baseDir}", &base_dir.to_string_lossy());

        Ok(Self {
            name,
            description,
            version: fm.version.unwrap_or_else(|| "1.0.0".into()),
            tags: fm.tags.0,
            triggers,
            capabilities: fm.capabilities.0,
            author: fm.author,
            license: fm.license,
            permissions: fm.permissions,
            environment: fm.environment,
            skill_type: non_blank(config.skill_type).unwrap_or_else(|| "generic".into()),
            user_groups: prefer(config.user_group.0, fm.user_groups.0),
            admin_groups: prefer(config.admin_group.0, fm.admin_groups.0),
            has_config,
            body,
            file_path,
            base_dir,
        })
    }

    /// Get the full instructions (body) for injection into conversation context.
    pub fn instructions(&self) -> &str {
        &self.body
    }

    /// Whether a caller in `groups` may use this skill. Skills without any
    /// group restriction are open to everyone.
    pub fn has_access(&self, groups: &[String]) -> bool {
        if self.user_groups.is_empty() && self.admin_groups.is_empty() {
            return true;
        }
        groups
            .iter()
            .any(|g| self.user_groups.contains(g) || self.admin_groups.contains(g))
    }

    /// Required environment variables absent from the process environment.
    pub fn missing_env(&self) -> Vec<String> {
        self.missing_env_with(|k| std::env::var_os(k).is_some())
    }

    pub fn missing_env_with(&self, is_set: impl Fn(&str) -> bool) -> Vec<String> {
        self.environment
            .required
            .iter()
            .filter(|v| !is_set(v.as_str()))
            .cloned()
            .collect()
    }
}

fn prefer(primary: Vec<String>, fallback: Vec<String>) -> Vec<String> {
    if primary.is_empty() { fallback } else { primary }
}

fn normalize_triggers(phrases: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(phrases.len());
    for p in phrases {
        let p = p.trim().to_lowercase();
        if !p.is_empty() && !out.contains(&p) {
            out.push(p);
        }
    }
    out
}

/// Split a SKILL.md file into front matter and Markdown body.
fn split_frontmatter(content: &str) -> std::result::Result<(&str, &str), &'static str> {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    let Some(after_first) = trimmed.strip_prefix("---") else {
        return Err("SKILL.md must start with front matter (---)");
    };
    let end_pos = after_first
        .find("\n---")
        .ok_or("missing closing --- for front matter")?;
    let yaml = &after_first[..end_pos];
    let rest = &after_first[end_pos + 4..];
    // Drop the remainder of the closing delimiter line.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    Ok((yaml, body.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<SkillDescriptor> {
        SkillDescriptor::parse(
            content,
            PathBuf::from("/skills/calendar-assistant/SKILL.md"),
            PathBuf::from("/skills/calendar-assistant"),
        )
    }

    #[test]
    fn test_parse_full_descriptor() {
        let content = r#"---
name: calendar-assistant
version: 1.2.0
description: Convert natural language into calendar files
tags: [productivity, calendar]
triggers:
  - Calendar
  - meeting
  - "add to calendar"
capabilities: [ics-generation]
author: Skillkit Contributors
license: MIT
permissions:
  network: true
environment:
  required: [NVIDIA_API_KEY]
  optional:
    TIMEZONE: UTC
    REMINDER_HOURS: 1
---

# Calendar Assistant

Use {baseDir}/assets/template.ics as a reference.
"#;
        let d = parse(content).unwrap();
        assert_eq!(d.name, "calendar-assistant");
        assert_eq!(d.version, "1.2.0");
        assert_eq!(d.triggers, vec!["calendar", "meeting", "add to calendar"]);
        assert_eq!(d.tags, vec!["productivity", "calendar"]);
        assert_eq!(d.capabilities, vec!["ics-generation"]);
        assert_eq!(d.license.as_deref(), Some("MIT"));
        assert_eq!(d.permissions.as_ref().unwrap()["network"], true);
        assert_eq!(d.environment.required, vec!["NVIDIA_API_KEY"]);
        assert_eq!(d.environment.default_for("TIMEZONE").as_deref(), Some("UTC"));
        assert_eq!(d.environment.default_for("REMINDER_HOURS").as_deref(), Some("1"));
        assert!(d.body.starts_with("# Calendar Assistant"));
        assert!(d.body.contains("/skills/calendar-assistant/assets/template.ics"));
    }

    #[test]
    fn test_triggers_fall_back_to_tags() {
        let d = parse("---\nname: x\ndescription: d\ntags: Brainstorm, IDEAS\n---\nBody").unwrap();
        assert_eq!(d.triggers, vec!["brainstorm", "ideas"]);
    }

    #[test]
    fn test_duplicate_and_blank_triggers_dropped() {
        let d = parse("---\nname: x\ndescription: d\ntriggers: [idea, ' Idea ', '']\n---\n").unwrap();
        assert_eq!(d.triggers, vec!["idea"]);
    }

    #[test]
    fn test_name_falls_back_to_directory() {
        let d = parse("---\ndescription: No explicit name\n---\nBody").unwrap();
        assert_eq!(d.name, "calendar-assistant");
        assert_eq!(d.version, "1.0.0");
    }

    #[test]
    fn test_missing_description_errors() {
        let err = parse("---\nname: no-desc\n---\nBody.").unwrap_err();
        assert_eq!(err.kind(), "descriptor");
        assert!(err.to_string().contains("no description"));
    }

    #[test]
    fn test_missing_frontmatter_errors() {
        assert!(parse("# No front matter\nJust markdown.").is_err());
        assert!(parse("---\nname: open\ndescription: never closed\n").is_err());
    }

    #[test]
    fn test_malformed_yaml_errors() {
        let err = parse("---\nname: [unclosed\ndescription: d\n---\n").unwrap_err();
        assert!(err.to_string().contains("bad front matter"));
    }

    #[test]
    fn test_access_control() {
        let open = parse("---\nname: a\ndescription: d\n---\n").unwrap();
        assert!(open.has_access(&[]));

        let restricted = parse(
            "---\nname: b\ndescription: d\nuser_groups: [staff]\nadmin_groups: [ops]\n---\n",
        )
        .unwrap();
        assert!(!restricted.has_access(&[]));
        assert!(!restricted.has_access(&["guests".to_string()]));
        assert!(restricted.has_access(&["staff".to_string()]));
        assert!(restricted.has_access(&["ops".to_string()]));
    }

    #[test]
    fn test_config_yaml_overrides_front_matter() {
        let config = "name: cal-pro\ndescription: From config\nskill_type: custom\nuser_group: [staff]\nadmin_group: ops\n";
        let d = SkillDescriptor::parse_with_config(
            "---\nname: cal\ndescription: From front matter\nuser_groups: [everyone]\n---\nBody",
            Some(config),
            PathBuf::from("/skills/cal/SKILL.md"),
            PathBuf::from("/skills/cal"),
        )
        .unwrap();
        assert_eq!(d.name, "cal-pro");
        assert_eq!(d.description, "From config");
        assert_eq!(d.skill_type, "custom");
        assert_eq!(d.user_groups, vec!["staff"]);
        assert_eq!(d.admin_groups, vec!["ops"]);
        assert!(d.has_config);
        assert!(!d.has_access(&["everyone".to_string()]));
        assert!(d.has_access(&["ops".to_string()]));
    }

    #[test]
    fn test_config_yaml_allows_plain_markdown_body() {
        let d = SkillDescriptor::parse_with_config(
            "# Ideas\nBrainstorm freely.",
            Some("description: Idea generation\n"),
            PathBuf::from("/skills/ideas/SKILL.md"),
            PathBuf::from("/skills/ideas"),
        )
        .unwrap();
        assert_eq!(d.name, "ideas");
        assert_eq!(d.body, "# Ideas\nBrainstorm freely.");
        assert!(d.user_groups.is_empty());
    }

    #[test]
    fn test_blank_or_bad_config_yaml() {
        let d = SkillDescriptor::parse_with_config(
            "---\nname: a\ndescription: d\n---\n",
            Some("  \n"),
            PathBuf::from("/s/a/SKILL.md"),
            PathBuf::from("/s/a"),
        )
        .unwrap();
        assert!(!d.has_config);
        assert_eq!(d.skill_type, "generic");

        let err = SkillDescriptor::parse_with_config(
            "---\nname: a\ndescription: d\n---\n",
            Some("user_group: [unclosed\n"),
            PathBuf::from("/s/a/SKILL.md"),
            PathBuf::from("/s/a"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("bad config.yaml"));
    }

    #[test]
    fn test_missing_env_reports_unset_required() {
        let d = parse("---\nname: a\ndescription: d\nenvironment:\n  required: [A_KEY, B_KEY]\n---\n")
            .unwrap();
        assert_eq!(d.missing_env_with(|k| k == "A_KEY"), vec!["B_KEY"]);
    }

    #[test]
    fn test_from_file_works() {
        let dir = tempfile::tempdir().unwrap();
        let skill_dir = dir.path().join("nvidia-ideagen");
        std::fs::create_dir_all(&skill_dir).unwrap();
        let path = skill_dir.join("SKILL.md");
        std::fs::write(&path, "---\ndescription: Ideas\ntriggers: [idea]\n---\n\n# Ideas").unwrap();

        let d = SkillDescriptor::from_file(&path).unwrap();
        assert_eq!(d.name, "nvidia-ideagen");
        assert_eq!(d.base_dir, skill_dir);
        assert_eq!(d.file_path, path);
        assert!(!d.has_config);

        std::fs::write(skill_dir.join("config.yaml"), "user_group: [research]\n").unwrap();
        let d = SkillDescriptor::from_file(&path).unwrap();
        assert!(d.has_config);
        assert!(!d.has_access(&[]));
        assert!(d.has_access(&["research".to_string()]));
    }
}
