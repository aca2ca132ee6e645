//! Portal Gate: session gating for the HR self-service portal.

pub mod backend;
pub mod checkin;
pub mod config;
pub mod directory;
pub mod error;
pub mod gate;
pub mod llm;
pub mod profile;
pub mod requests;
pub mod shell;
