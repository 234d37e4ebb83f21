//! # skillkit-cli
//!
//! Command-line interface for skillkit.
//!
//! - `skillkit skill list|show|resources`: inspect the loaded skills
//! - `skillkit route <query>`: show which skill a query selects
//! - `skillkit run <query>`: route and execute once, saving any artifact
//! - `skillkit chat`: interactive route, activate and execute loop
//! - `skillkit serve`: start the HTTP API
//! - `skillkit config`, `skillkit doctor`: inspect and audit configuration

pub mod commands;

pub use commands::Cli;
