//! Errors surfaced while cloning and registering objects.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObjectError {
    #[error("path '{0}' escapes the mudlib root or does not exist")]
    PathRejected(String),

    #[error("failed to read source file {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("compile errors in {path}: {detail}")]
    Compile { path: String, detail: String },

    #[error("failed to load compiled program for {path}: {source}")]
    Load { path: String, source: amlp_loader::LoadError },
}

pub type ObjectResult<T> = Result<T, ObjectError>;
