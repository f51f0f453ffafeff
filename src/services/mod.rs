//! Service layer for file I/O
//!
//! Pipeline stages work on in-memory images; everything that touches the
//! filesystem goes through here.

pub mod io;

pub use io::{DebugArtifacts, ImageIOService};
