//! Error taxonomy for the rendering pipeline.
//!
//! Every fallible stage in the pipeline returns `Result<(), Error>` internally;
//! `Renderer::render` collapses that into the boolean success contract callers
//! see, logging the error at the point it is produced.

use thiserror::Error;

/// The four error kinds the pipeline can produce.
///
/// None of these are raised as panics or unwinding control flow — a stage
/// that fails returns `Err` and the caller (usually another pipeline stage,
/// ultimately `render`) decides whether to abort the frame or degrade.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad caller input, caught by validation before any GPU work is issued.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A GPU capability was probed and found missing at runtime. The
    /// corresponding disable flag is set before this is returned.
    #[error("capability unavailable: {0}")]
    Capability(&'static str),

    /// A shader dispatch (compile, allocate, or submit) failed transiently.
    #[error("dispatch failed: {0}")]
    Dispatch(&'static str),

    /// A hook returned failure, or tried to resize the image at a
    /// non-resizable stage.
    #[error("hook contract violated: {0}")]
    HookContract(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
