//! Typed errors for the crate's small set of fallible, construction-time
//! operations. Everything else (§7) is a contract violation and panics.

use thiserror::Error;

/// Errors returned by fallible construction-time APIs.
///
/// Per the error handling design, almost everything in this crate is either
/// infallible or a fatal contract violation (`assert!`/`panic!`). This enum
/// covers the narrow remainder: operations whose failure is a normal,
/// recoverable outcome of bad input rather than a broken invariant.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("narrow-phase tester already registered for shape pair ({0:?}, {1:?})")]
    TesterAlreadyRegistered(crate::geometry::collidable::ShapeType, crate::geometry::collidable::ShapeType),

    #[error("invalid allocation hints: {0}")]
    InvalidAllocationHints(&'static str),

    #[error("invalid integration parameters: {0}")]
    InvalidIntegrationParameters(&'static str),
}
