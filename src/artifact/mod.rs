//! Artifact handling
//!
//! - [`locate_artifact`] finds the file a successful worker produced
//! - [`PartialFiles`] removes leftovers of a failed job
//! - [`ArtifactStore`] serves a finished artifact exactly once and deletes it

mod cleanup;
mod handoff;
mod locate;

pub use cleanup::PartialFiles;
pub use handoff::{Artifact, ArtifactStore, content_type_for};
pub use locate::{OutputHints, locate_artifact};
