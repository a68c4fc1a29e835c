//! Typed external commands.
//!
//! This module contains structs that implement `SystemCommand` for each
//! collaborator hostprep drives. Each struct maps Rust fields to the exact
//! command line the tool expects.

pub mod dnf;
pub mod git;
pub mod system;
pub mod systemctl;
