//! Error types for trellis-core

use thiserror::Error;

use crate::fiber::FiberId;

/// Fatal render errors.
///
/// Any of these aborts the render pass that produced it. The
/// work-in-progress fiber is discarded by the caller and the current
/// generation is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("component `{component}` ({fiber:?}) rendered more hooks than during the previous render")]
    TooManyHooks { fiber: FiberId, component: String },

    #[error(
        "hook #{index} of component `{component}` ({fiber:?}) changed between renders: \
         expected {expected}, found {found}"
    )]
    HookKindMismatch {
        fiber: FiberId,
        component: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("hooks can only be called while a component is rendering")]
    OutsideRender,

    #[error("cannot render {requested:?} while {active:?} is still rendering")]
    RenderInProgress { active: FiberId, requested: FiberId },

    #[error("fiber {0:?} is not a function component")]
    NotAComponent(FiberId),

    #[error("unknown fiber {0:?}")]
    UnknownFiber(FiberId),

    #[error("invalid runtime config: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
