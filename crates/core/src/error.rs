//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is a deterministic business failure raised before any state is
/// changed. Storage and transport failures belong to the layers that own them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Malformed or missing input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown filament, machine, job, SKU or order.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate identifier or SKU on create.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Not enough free material to satisfy a reservation.
    #[error("insufficient stock for {sku}: needed {needed}g, free {free}g")]
    InsufficientStock { sku: String, needed: f64, free: f64 },

    /// The operation would break a ledger invariant (e.g. available < reserved).
    #[error("invalid state: {0}")]
    State(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn insufficient_stock(sku: impl Into<String>, needed: f64, free: f64) -> Self {
        Self::InsufficientStock {
            sku: sku.into(),
            needed,
            free,
        }
    }

    /// Stable machine-readable code, used by transports.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::NotFound(_) => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::State(_) => "state_error",
        }
    }
}
