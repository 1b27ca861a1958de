//! # ce-cli — Chartered Ease Operator CLI
//!
//! ## Subcommands
//!
//! - `hash-password` — produce an argon2 PHC string for
//!   `CE_ADMIN_PASSWORD_HASH` or a staff account import
//! - `legacy inspect` — summarize a legacy browser-storage export
//! - `legacy convert` — convert a legacy export into domain records
//!
//! Handlers return the process exit code; errors carry `anyhow` context.

pub mod legacy;
pub mod password;
