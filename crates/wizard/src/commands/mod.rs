//! Command implementations for the wizard CLI
//!
//! Each command module handles the CLI interface and delegates to
//! wizard-template for the actual expansion.

pub mod dump;
pub mod expand;
