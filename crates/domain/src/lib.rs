//! `gs-domain` — types shared by the gardena client crates.

pub mod config;
pub mod credentials;
pub mod error;
pub mod trace;
