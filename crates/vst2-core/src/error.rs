//! Error types for the dispatch bridge

use crate::opcode::PluginOpcode;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Opening,
    EntryPoint,
    Instantiation,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStage::Opening => write!(f, "opening library"),
            LoadStage::EntryPoint => write!(f, "resolving entry point"),
            LoadStage::Instantiation => write!(f, "creating instance"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Module load failed at {stage} stage: {path}\n  Reason: {reason}")]
    LoadFailed {
        path: PathBuf,
        stage: LoadStage,
        reason: String,
    },

    #[error("Entry point returned an invalid effect: {0}")]
    InvalidEntryPoint(String),

    #[error("Malformed reply to {opcode}: {reason}")]
    MalformedReply {
        opcode: PluginOpcode,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
