//! # skillkit-core
//!
//! Core types and primitives for the skillkit agent-skills runtime.
//! This crate defines the shared vocabulary used by every other crate in the workspace.

pub mod artifact;
pub mod error;
pub mod message;
pub mod tool;

pub use artifact::Artifact;
pub use error::{Result, SkillkitError};
pub use message::{Message, Role};
pub use tool::Tool;
