//! Iteration control signal.

use thiserror::Error;

/// Result type for cursor operations.
pub type IterResult<T> = Result<T, StopIteration>;

/// Raised by [`Cursor::try_next`](crate::Cursor::try_next) once the cursor
/// is exhausted.
///
/// This is a control signal rather than a failure. The generic algorithms
/// on [`Sequenceable`](crate::Sequenceable) treat it as end of input; only a
/// seedless `reduce` over an empty collection lets it escape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("no such element")]
pub struct StopIteration;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(StopIteration.to_string(), "no such element");
    }
}
