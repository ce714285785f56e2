//! What a run produces for the outside world.
//!
//! # Submodules
//!
//! - [`digest`]: turns site results into the ordered chat message chunks
//! - [`json`]: archives the full run report as JSON, one file per run

pub mod digest;
pub mod json;
