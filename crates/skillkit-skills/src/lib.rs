//! # skillkit-skills
//!
//! Skills are directories holding a `SKILL.md` descriptor (YAML front matter
//! plus Markdown instructions) and optional `references/` and `assets/`
//! folders. This crate turns those directories into a query pipeline:
//!
//! 1. [`SkillRegistry::load`] scans the skill directories once at startup and
//!    binds each descriptor to a handler from an explicit [`HandlerTable`].
//! 2. [`Router`] scores every skill by counting its trigger phrases found in
//!    the query and picks the best one.
//! 3. [`SkillRegistry::activate`] loads the chosen skill's instructions.
//! 4. [`Executor`] invokes the handler and labels any failure inside it.
//!
//! ## SKILL.md Format
//!
//! ```markdown
//! ---
//! name: calendar-assistant
//! description: Convert natural language into .ics calendar files
//! triggers: [calendar, meeting, appointment, schedule]
//! environment:
//!   required: [NVIDIA_API_KEY]
//! ---
//!
//! # Calendar Assistant
//! ...
//! ```

pub mod descriptor;
pub mod executor;
pub mod handler;
pub mod prompt;
pub mod registry;
pub mod resources;
pub mod router;
pub mod stream;

pub use descriptor::{EnvironmentSpec, SkillDescriptor};
pub use executor::{ExecutionResult, Executor, StreamingExecution};
pub use handler::{HandlerTable, Invocation, SkillHandler, SkillOutput};
pub use prompt::Activation;
pub use registry::{RegisteredSkill, SkillRegistry, SkippedSkill};
pub use resources::{AssetContent, ResourceListing};
pub use router::{match_query, MatchResult, Router, SkillScore, TieBreak};
pub use stream::{TextSender, TextStream};
