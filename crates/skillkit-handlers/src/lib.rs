//! # skillkit-handlers
//!
//! Built-in skill implementations bound to the bundled descriptors:
//!
//! - `calendar-assistant` ([`CalendarSkill`]): natural language to RFC 5545
//!   `.ics` files.
//! - `nvidia-ideagen` ([`IdeaGenSkill`]): streamed idea generation,
//!   brainstorming and expansion.
//!
//! Both talk to the model through [`skillkit_llm::LlmProvider`], so tests run
//! against `MockProvider`.

pub mod bridge;
pub mod calendar;
pub mod chat;
pub mod ics;
pub mod ideagen;
pub mod params;

pub use calendar::{CalendarSkill, EventData};
pub use chat::FallbackChat;
pub use ics::{CalendarEvent, Participant, build_ics};
pub use ideagen::{ExpansionKind, IdeaGenSkill, SavedIdeas};
pub use params::{IdeaParams, extract_idea_params, safe_stem};

use skillkit_config::SkillkitConfig;
use skillkit_core::Result;
use skillkit_llm::LlmProvider;
use skillkit_skills::HandlerTable;
use std::sync::Arc;

/// Skill name of the calendar descriptor.
pub const CALENDAR_SKILL: &str = "calendar-assistant";
/// Skill name of the idea generation descriptor.
pub const IDEAGEN_SKILL: &str = "nvidia-ideagen";

/// Handler table for the built-in skills. Fails on an invalid calendar
/// timezone.
pub fn builtin_handlers(config: &SkillkitConfig, provider: Arc<dyn LlmProvider>) -> Result<HandlerTable> {
    let calendar = CalendarSkill::from_config(Arc::clone(&provider), config)?;
    let ideagen = IdeaGenSkill::from_config(provider, config);
    Ok(HandlerTable::new()
        .with(CALENDAR_SKILL, Arc::new(calendar))
        .with(IDEAGEN_SKILL, Arc::new(ideagen)))
}
