//! Patchrack Core - Patch database and shared types for the librarian

pub mod config;
pub mod db;
pub mod types;

pub use types::*;
