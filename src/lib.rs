//! gitbuddy - guided status, stage, commit and push to GitHub
//!
//! The binary in `main.rs` is a thin clap front end over these modules.

pub mod config;
pub mod display;
pub mod errors;
pub mod git;
pub mod logging;
pub mod prompt;
pub mod session;
pub mod workflow;
