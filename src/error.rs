use std::path::PathBuf;

use thiserror::Error;

use crate::mesh::{Attribute, MaterialKey};

/// A mesh that cannot be composed because its per-vertex attributes do not
/// line up with its positions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComposeError {
    #[error("mesh #{index} ({material}) has {found} {attribute} entries, expected {expected}")]
    AttributeMismatch {
        index: usize,
        material: MaterialKey,
        attribute: Attribute,
        expected: usize,
        found: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    #[error("out of GPU memory while creating {0}")]
    OutOfMemory(&'static str),
    #[error("could not create {0}")]
    ResourceCreation(&'static str),
    #[error("OpenGL error {name} ({code:#x}) while creating {what}")]
    Driver {
        what: &'static str,
        name: &'static str,
        code: u32,
    },
    #[error("compiling {stage} shader failed: {log}")]
    ShaderCompile { stage: &'static str, log: String },
    #[error("linking shader program failed: {0}")]
    ProgramLink(String),
}

#[derive(Error, Debug)]
pub enum MaterialError {
    #[error("material \"{0}\" was not found")]
    NotFound(String),
    #[error("could not read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config is not valid JSON: {0}")]
    Parse(String),
    #[error("config field \"{field}\" should be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// Failures of a scene recomposition, surfaced to the frame loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("could not read document {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("document is not valid JSON: {0}")]
    Json(String),
    #[error("document {0} is missing or has the wrong type")]
    Field(&'static str),
    #[error(transparent)]
    Value(#[from] crate::world::ParseError),
}
