//! `gs-cli` — command-line host for the Gardena smart system client.

pub mod cli;
