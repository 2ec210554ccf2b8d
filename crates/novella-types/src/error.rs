//! Validation errors raised by the shared record types.

/// Errors from interpreting a scene key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneIdError {
    /// The key contains no embedded integer to increment.
    #[error("scene key {key:?} contains no digits")]
    NoDigits {
        /// The offending scene key.
        key: String,
    },

    /// The embedded integer does not fit the scene counter.
    #[error("scene key {key:?} has a number too large for the scene counter")]
    Overflow {
        /// The offending scene key.
        key: String,
    },
}

/// Errors from validating a narrative outline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutlineError {
    /// The outline's `ending.description` is blank.
    #[error("outline ending has an empty description")]
    EmptyEnding,
}
