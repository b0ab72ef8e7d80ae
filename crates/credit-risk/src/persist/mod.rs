//! Artifact persistence.
//!
//! An [`Artifact`] is stored through schema types ([`schema`]) rather than
//! the runtime types, so the runtime types can change without breaking files.
//! Loading validates the format version, the checksum, the feature layout and
//! every fitted parameter before an artifact is handed out.

mod artifact;
mod codec;
mod convert;
mod error;
pub mod schema;

pub use artifact::Artifact;
pub use codec::{
    FORMAT_VERSION, MAGIC, StagedWrite, is_json_path, stage, stage_json, write_atomic, write_json_atomic,
};
pub use error::ArtifactError;
