//! Artifact and payload types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Packaged source, in the field layout the worker expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Artifact {
    /// A single file shipped as text
    SingleFile {
        /// File contents
        file: String,
        /// Base name of the file
        filename: String,
    },

    /// A directory shipped as a base64-encoded zip
    Archive {
        /// Base64 of the zip bytes
        artifact: String,
        /// Base name of the packed directory
        workdir: String,
    },
}

impl Artifact {
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::SingleFile { .. } => "file",
            Artifact::Archive { .. } => "archive",
        }
    }

    /// The text carried by this artifact
    pub fn content(&self) -> &str {
        match self {
            Artifact::SingleFile { file, .. } => file,
            Artifact::Archive { artifact, .. } => artifact,
        }
    }
}

/// The job input: artifact plus how to run it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(flatten)]
    pub artifact: Artifact,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Payload {
    pub fn new(
        artifact: Artifact,
        entrypoint: Option<String>,
        env: HashMap<String, String>,
    ) -> Self {
        Self {
            artifact,
            entrypoint,
            env,
        }
    }
}
