//! Aggregate functions.
//!
//! Every function borrows its input and returns `None` for an empty slice.
//! None of them reorder the caller's data; `median` sorts a private copy.

use crate::error::CoreError;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Supported aggregates, tagged with their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
    Max = 1,
    Min = 2,
    Median = 3,
    Mode = 4,
}

impl Aggregate {
    pub const ALL: [Aggregate; 4] = [
        Aggregate::Max,
        Aggregate::Min,
        Aggregate::Median,
        Aggregate::Mode,
    ];

    /// Wire code of the aggregate.
    pub fn code(&self) -> i64 {
        *self as i64
    }

    /// Short name used in logs, metrics labels and the CLI.
    pub fn name(&self) -> &'static str {
        match self {
            Aggregate::Max => "max",
            Aggregate::Min => "min",
            Aggregate::Median => "median",
            Aggregate::Mode => "trend",
        }
    }

    /// Applies the aggregate. Returns `None` for an empty slice.
    pub fn apply(&self, values: &[i64]) -> Option<i64> {
        match self {
            Aggregate::Max => max(values),
            Aggregate::Min => min(values),
            Aggregate::Median => median(values),
            Aggregate::Mode => mode(values),
        }
    }
}

impl TryFrom<i64> for Aggregate {
    type Error = CoreError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Aggregate::Max),
            2 => Ok(Aggregate::Min),
            3 => Ok(Aggregate::Median),
            4 => Ok(Aggregate::Mode),
            other => Err(CoreError::InvalidCommand(other)),
        }
    }
}

impl FromStr for Aggregate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "max" | "1" => Ok(Aggregate::Max),
            "min" | "2" => Ok(Aggregate::Min),
            "median" | "3" => Ok(Aggregate::Median),
            "mode" | "trend" | "4" => Ok(Aggregate::Mode),
            other => Err(format!("unknown aggregate '{}'", other)),
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Largest element; the first of equal maxima.
pub fn max(values: &[i64]) -> Option<i64> {
    let (&first, rest) = values.split_first()?;
    let mut best = first;
    for &v in rest {
        if v > best {
            best = v;
        }
    }
    Some(best)
}

/// Smallest element.
pub fn min(values: &[i64]) -> Option<i64> {
    let (&first, rest) = values.split_first()?;
    let mut best = first;
    for &v in rest {
        if v < best {
            best = v;
        }
    }
    Some(best)
}

/// Element at index `len / 2` of the sorted values.
///
/// For an even length this is the upper-middle element, not the mean of
/// the two middle elements.
pub fn median(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    Some(sorted[sorted.len() / 2])
}

/// Most frequent element. Ties go to the smallest value.
pub fn mode(values: &[i64]) -> Option<i64> {
    let mut counts: HashMap<i64, usize> = HashMap::with_capacity(values.len());
    for &v in values {
        *counts.entry(v).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.cmp(va)))
        .map(|(value, _)| value)
}
