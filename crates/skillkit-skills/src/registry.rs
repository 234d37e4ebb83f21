use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::descriptor::SkillDescriptor;
use crate::handler::{HandlerTable, SkillHandler};

/// A loaded skill: its descriptor plus the bound entry point, if any.
#[derive(Clone)]
pub struct RegisteredSkill {
    pub descriptor: SkillDescriptor,
    pub handler: Option<Arc<dyn SkillHandler>>,
}

impl RegisteredSkill {
    /// Names of the tools exposed by the bound handler.
    pub fn tool_names(&self) -> Vec<String> {
        self.handler
            .as_ref()
            .map(|h| vec![h.tool().name])
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for RegisteredSkill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSkill")
            .field("name", &self.descriptor.name)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// A descriptor that was found but not registered.
#[derive(Debug, Clone)]
pub struct SkippedSkill {
    pub path: PathBuf,
    pub reason: String,
}

/// The skill registry: every discovered skill in registration order.
///
/// Built once by scanning the skill directories, then shared read-only
/// (typically behind an `Arc`). Directories are listed in precedence order;
/// when two directories define the same skill name, the first one wins.
#[derive(Debug, Default)]
pub struct SkillRegistry {
    skills: Vec<RegisteredSkill>,
    index: HashMap<String, usize>,
    skipped: Vec<SkippedSkill>,
}

impl SkillRegistry {
    /// Create an empty registry (for tests and programmatic setups).
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `dirs` for `<skill>/SKILL.md` (or a `SKILL.md` directly inside a
    /// directory) and bind handlers from `handlers` by skill name.
    ///
    /// Missing directories, unreadable or malformed descriptors and
    /// duplicate names are logged and skipped; loading never fails.
    pub fn load(dirs: &[PathBuf], handlers: &HandlerTable) -> Self {
        let mut registry = Self::new();

        for dir in dirs {
            if !dir.exists() {
                debug!(?dir, "skills directory does not exist, skipping");
                continue;
            }
            for skill_md in descriptor_files(dir) {
                registry.load_one(&skill_md, handlers);
            }
        }

        for name in handlers.names() {
            if !registry.contains(name) {
                debug!(skill = name, "handler has no descriptor, not exposed");
            }
        }

        info!(
            loaded = registry.len(),
            skipped = registry.skipped.len(),
            "skill registry ready"
        );
        registry
    }

    fn load_one(&mut self, skill_md: &Path, handlers: &HandlerTable) {
        let descriptor = match SkillDescriptor::from_file(skill_md) {
            Ok(d) => d,
            Err(e) => {
                warn!(path = ?skill_md, error = %e, "failed to load skill");
                self.skipped.push(SkippedSkill {
                    path: skill_md.to_path_buf(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        if let Some(existing) = self.get(&descriptor.name) {
            warn!(
                skill = %descriptor.name,
                path = ?skill_md,
                kept = ?existing.file_path,
                "duplicate skill name, keeping the first one loaded"
            );
            self.skipped.push(SkippedSkill {
                path: skill_md.to_path_buf(),
                reason: format!("duplicate skill name '{}'", descriptor.name),
            });
            return;
        }

        let handler = handlers.get(&descriptor.name);
        if handler.is_none() {
            debug!(skill = %descriptor.name, "no handler registered, skill is listing-only");
        }
        info!(skill = %descriptor.name, path = ?skill_md, triggers = descriptor.triggers.len(), "loaded skill");
        self.register(descriptor, handler);
    }

    /// Register a skill programmatically. Returns `false` (and changes
    /// nothing) when the name is already taken.
    pub fn register(
        &mut self,
        descriptor: SkillDescriptor,
        handler: Option<Arc<dyn SkillHandler>>,
    ) -> bool {
        if self.index.contains_key(&descriptor.name) {
            return false;
        }
        self.index.insert(descriptor.name.clone(), self.skills.len());
        self.skills.push(RegisteredSkill {
            descriptor,
            handler,
        });
        true
    }

    /// Get a skill's descriptor by name.
    pub fn get(&self, name: &str) -> Option<&SkillDescriptor> {
        self.entry(name).map(|s| &s.descriptor)
    }

    /// Get a skill with its bound handler.
    pub fn entry(&self, name: &str) -> Option<&RegisteredSkill> {
        self.index.get(name).map(|&i| &self.skills[i])
    }

    pub fn handler(&self, name: &str) -> Option<Arc<dyn SkillHandler>> {
        self.entry(name).and_then(|s| s.handler.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All descriptors in registration order.
    pub fn list(&self) -> Vec<&SkillDescriptor> {
        self.skills.iter().map(|s| &s.descriptor).collect()
    }

    /// All entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &RegisteredSkill> {
        self.skills.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.skills.iter().map(|s| s.descriptor.name.as_str()).collect()
    }

    /// Descriptors a caller in `groups` may use, in registration order.
    pub fn accessible(&self, groups: &[String]) -> Vec<&SkillDescriptor> {
        self.skills
            .iter()
            .map(|s| &s.descriptor)
            .filter(|d| d.has_access(groups))
            .collect()
    }

    /// Descriptors found on disk but not registered.
    pub fn skipped(&self) -> &[SkippedSkill] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

/// SKILL.md files under `dir`, sorted by path so registration order does
/// not depend on the filesystem.
fn descriptor_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(?dir, error = %e, "failed to read skills directory");
            return vec![];
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter_map(|path| {
            if path.is_dir() {
                let skill_md = path.join("SKILL.md");
                skill_md.is_file().then_some(skill_md)
            } else if path.file_name().is_some_and(|n| n == "SKILL.md") {
                Some(path)
            } else {
                None
            }
        })
        .collect();
    files.sort();
    files
}
