//! Command dispatch.

use crate::aggregate::Aggregate;
use crate::error::CoreError;

/// Computes the aggregate identified by the wire `code` over `values`.
///
/// The command is validated before the input, so an unknown code fails with
/// [`CoreError::InvalidCommand`] whatever the vector holds. The input is
/// never mutated, which makes repeated calls on the same data return the
/// same result.
pub fn compute(code: i64, values: &[i64]) -> Result<i64, CoreError> {
    let aggregate = Aggregate::try_from(code)?;
    aggregate.apply(values).ok_or(CoreError::EmptyVector)
}
