//! Error types for pgclone

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while cloning a project
#[derive(Error, Debug)]
pub enum CloneError {
    #[error("{stage} requires {path}, which does not exist (run `{hint}` first)")]
    MissingArtifact {
        stage: &'static str,
        path: PathBuf,
        hint: &'static str,
    },

    #[error("Missing required setting: {name} (pass {flag} or set {env})")]
    MissingSetting {
        name: &'static str,
        flag: &'static str,
        env: &'static str,
    },

    #[error("Required tool not found on PATH: {tool}")]
    MissingTool { tool: String },

    #[error("Failed to read artifact: {path}")]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write artifact: {path}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start {program}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {detail}")]
    ProcessFailed {
        program: String,
        status: String,
        detail: String,
    },

    #[error("Verification failed: {message}")]
    VerificationFailed { message: String },

    #[error("Confirmation prompt failed: {message}")]
    Prompt { message: String },
}

impl From<dialoguer::Error> for CloneError {
    fn from(err: dialoguer::Error) -> Self {
        CloneError::Prompt {
            message: err.to_string(),
        }
    }
}
