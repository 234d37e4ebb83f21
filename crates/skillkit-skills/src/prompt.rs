use chrono::NaiveDateTime;
use serde::Serialize;
use skillkit_core::{Result, SkillkitError};

use crate::registry::SkillRegistry;

const BASE_PROMPT: &str = "You are an intelligent AI assistant with access to specialized skills.

When responding to user queries:
1. Analyze if the query matches any available skill's purpose
2. If a skill is activated, follow its instructions precisely
3. Use the skill's capabilities to provide accurate, helpful responses
4. If no skill matches, respond normally using your general knowledge";

/// What activating a skill loaded.
#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    pub skill: String,
    pub description: String,
    /// Length of the instruction body in characters.
    pub instructions_len: usize,
    pub skill_type: String,
    pub has_config: bool,
    pub has_references: bool,
    pub has_assets: bool,
    /// Tools exposed by the bound handler (empty for listing-only skills).
    pub tools: Vec<String>,
}

impl Activation {
    pub fn summary(&self) -> String {
        format!(
            "Loaded {} tool(s), {} chars of instructions",
            self.tools.len(),
            self.instructions_len
        )
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

impl SkillRegistry {
    /// The `<available_skills>` block listing every skill a caller in
    /// `groups` may use, sorted by name.
    pub fn available_skills_block(&self, groups: &[String]) -> String {
        let mut skills = self.accessible(groups);
        if skills.is_empty() {
            return "<available_skills></available_skills>".to_string();
        }
        skills.sort_by(|a, b| a.name.cmp(&b.name));

        let mut block = String::from("<available_skills>\n");
        for skill in skills {
            block.push_str(&format!(
                "  <skill>\n    <name>{}</name>\n    <description>{}</description>\n    <location>{}</location>\n  </skill>\n",
                escape_xml(&skill.name),
                escape_xml(&skill.description),
                escape_xml(&skill.base_dir.display().to_string()),
            ));
        }
        block.push_str("</available_skills>");
        block
    }

    /// Load a skill's full instructions and report what it brings along.
    pub fn activate(&self, name: &str) -> Result<Activation> {
        let entry = self
            .entry(name)
            .ok_or_else(|| SkillkitError::SkillNotFound(name.to_string()))?;
        let d = &entry.descriptor;
        Ok(Activation {
            skill: d.name.clone(),
            description: d.description.clone(),
            instructions_len: d.instructions().chars().count(),
            skill_type: d.skill_type.clone(),
            has_config: d.has_config,
            has_references: d.references_dir().is_dir(),
            has_assets: d.assets_dir().is_dir(),
            tools: entry.tool_names(),
        })
    }

    /// System prompt for a chat turn, stamped with the local time.
    pub fn system_prompt(&self, activated: Option<&str>, groups: &[String]) -> String {
        self.system_prompt_at(activated, groups, chrono::Local::now().naive_local())
    }

    /// Base instructions, the skills block and, when a skill is active, its
    /// full instructions.
    pub fn system_prompt_at(
        &self,
        activated: Option<&str>,
        groups: &[String],
        now: NaiveDateTime,
    ) -> String {
        let mut prompt = format!(
            "{BASE_PROMPT}\n\nCurrent date: {}\nCurrent time: {}\n\n{}\n",
            now.format("%Y-%m-%d"),
            now.format("%H:%M:%S"),
            self.available_skills_block(groups),
        );

        if let Some(skill) = activated.and_then(|name| self.get(name))
            && !skill.instructions().is_empty()
        {
            prompt.push_str(&format!(
                "\n# ACTIVATED SKILL: {}\n\n## Skill Instructions:\n\n{}\n\n## End of Skill Instructions\n\nYou MUST follow the above skill instructions for this query.\n",
                skill.name,
                skill.instructions()
            ));
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::SkillDescriptor;
    use std::path::{Path, PathBuf};

    fn add(reg: &mut SkillRegistry, base: &Path, name: &str, desc: &str, body: &str) {
        let d = SkillDescriptor::parse(
            &format!("---\nname: {name}\ndescription: \"{desc}\"\n---\n{body}"),
            base.join(name).join("SKILL.md"),
            base.join(name),
        )
        .unwrap();
        reg.register(d, None);
    }

    #[test]
    fn test_block_is_sorted_and_escaped() {
        let mut reg = SkillRegistry::new();
        add(&mut reg, Path::new("/s"), "zeta", "Last <one>", "");
        add(&mut reg, Path::new("/s"), "alpha", "First & best", "");

        let block = reg.available_skills_block(&[]);
        let alpha = block.find("<name>alpha</name>").unwrap();
        let zeta = block.find("<name>zeta</name>").unwrap();
        assert!(alpha < zeta);
        assert!(block.contains("<description>First &amp; best</description>"));
        assert!(block.contains("Last &lt;one&gt;"));
        assert!(block.contains("<location>/s/alpha</location>"));
    }

    #[test]
    fn test_empty_block() {
        assert_eq!(
            SkillRegistry::new().available_skills_block(&[]),
            "<available_skills></available_skills>"
        );
    }

    #[test]
    fn test_activation_reports_resources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("cal/references")).unwrap();
        let mut reg = SkillRegistry::new();
        add(&mut reg, dir.path(), "cal", "Calendar", "# Calendar\nDo things.");

        let a = reg.activate("cal").unwrap();
        assert_eq!(a.instructions_len, "# Calendar\nDo things.".len());
        assert!(a.has_references);
        assert!(!a.has_assets);
        assert!(!a.has_config);
        assert_eq!(a.skill_type, "generic");
        assert!(a.tools.is_empty());
        assert!(a.summary().contains("0 tool(s)"));
        assert_eq!(reg.activate("missing").unwrap_err().kind(), "skill_not_found");
    }

    #[test]
    fn test_system_prompt_includes_activated_instructions() {
        let mut reg = SkillRegistry::new();
        add(&mut reg, &PathBuf::from("/s"), "cal", "Calendar", "Always use UTC.");
        let now = chrono::NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();

        let plain = reg.system_prompt_at(None, &[], now);
        assert!(plain.contains("Current date: 2025-03-14"));
        assert!(plain.contains("Current time: 09:30:00"));
        assert!(plain.contains("<name>cal</name>"));
        assert!(!plain.contains("ACTIVATED SKILL"));

        let active = reg.system_prompt_at(Some("cal"), &[], now);
        assert!(active.contains("# ACTIVATED SKILL: cal"));
        assert!(active.contains("Always use UTC."));
    }
}
