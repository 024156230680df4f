//! Row and column selections.
//!
//! A [`Selection`] names the rows (and optionally columns) an array-level
//! read or write targets. Each axis is an [`Index`]: one position, a
//! half-open stepped range, or an explicit ordered list. Selections are
//! resolved to concrete positions before any row is touched, so a malformed
//! selection never partially executes.

use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use crate::error::{Error, Result};

/// Positions along one axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Index {
    /// One position.
    Single(i64),
    /// `start..stop` by `step`. Defaults: start 0, stop the axis bound, step 1.
    Range {
        /// First position.
        start: Option<i64>,
        /// Exclusive end.
        stop: Option<i64>,
        /// Stride; may be negative, never zero.
        step: Option<i64>,
    },
    /// Explicit positions in order; repeats allowed.
    List(Vec<i64>),
}

impl Index {
    /// The whole axis.
    #[must_use]
    pub const fn all() -> Self {
        Self::Range { start: None, stop: None, step: None }
    }

    /// A stepped range.
    #[must_use]
    pub const fn stepped(start: i64, stop: i64, step: i64) -> Self {
        Self::Range { start: Some(start), stop: Some(stop), step: Some(step) }
    }

    /// Resolves to concrete positions along an axis of length `bound`.
    ///
    /// Only range defaults consult `bound`; explicit positions beyond it
    /// are left for the caller to reject.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelection`] for a zero step or any negative
    /// position.
    pub fn resolve(&self, bound: usize) -> Result<Vec<usize>> {
        match self {
            Self::Single(position) => Ok(vec![non_negative(*position)?]),
            Self::List(positions) => positions.iter().map(|&p| non_negative(p)).collect(),
            Self::Range { start, stop, step } => {
                let bound = i64::try_from(bound).unwrap_or(i64::MAX);
                let start = start.unwrap_or(0);
                let stop = stop.unwrap_or(bound);
                let step = step.unwrap_or(1);
                if step == 0 {
                    return Err(Error::InvalidSelection {
                        reason: "range step must not be zero".to_string(),
                    });
                }
                let mut positions = Vec::new();
                let mut position = start;
                while (step > 0 && position < stop) || (step < 0 && position > stop) {
                    positions.push(non_negative(position)?);
                    match position.checked_add(step) {
                        Some(next) => position = next,
                        None => break,
                    }
                }
                Ok(positions)
            }
        }
    }
}

fn non_negative(position: i64) -> Result<usize> {
    usize::try_from(position).map_err(|_| Error::InvalidSelection {
        reason: format!("position {position} is negative"),
    })
}

/// Rows, or rows and columns, targeted by an array-level operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Rows only; all columns.
    Rows(Index),
    /// A tuple of per-axis indices: `(rows,)` or `(rows, columns)`.
    Composite(Vec<Index>),
}

/// A selection resolved against an array's shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSelection {
    /// Row ids, in selection order.
    pub rows: Vec<usize>,
    /// Column positions, or `None` for every column.
    pub columns: Option<Vec<usize>>,
}

impl Selection {
    /// Builds a composite selection from per-axis indices.
    #[must_use]
    pub fn composite(indices: Vec<Index>) -> Self {
        Self::Composite(indices)
    }

    /// Resolves against an array of `nrows` rows and `ncols` columns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelection`] for a composite of zero or more
    /// than two indices, a malformed index, or a column `>= ncols`.
    pub fn resolve(&self, nrows: usize, ncols: usize) -> Result<ResolvedSelection> {
        let (rows, columns) = match self {
            Self::Rows(rows) => (rows, None),
            Self::Composite(indices) => match indices.as_slice() {
                [rows] => (rows, None),
                [rows, columns] => (rows, Some(columns)),
                [] => {
                    return Err(Error::InvalidSelection {
                        reason: "empty index tuple".to_string(),
                    });
                }
                _ => {
                    return Err(Error::InvalidSelection {
                        reason: format!("too many indices: {} (at most 2)", indices.len()),
                    });
                }
            },
        };
        let rows = rows.resolve(nrows)?;
        let columns = columns.map(|columns| columns.resolve(ncols)).transpose()?;
        if let Some(column) = columns.iter().flatten().find(|&&column| column >= ncols) {
            return Err(Error::InvalidSelection {
                reason: format!("column {column} out of range for {ncols} columns"),
            });
        }
        Ok(ResolvedSelection { rows, columns })
    }
}

impl From<Index> for Selection {
    fn from(index: Index) -> Self {
        Self::Rows(index)
    }
}

impl From<RangeFull> for Index {
    fn from(_: RangeFull) -> Self {
        Self::all()
    }
}

impl From<RangeFull> for Selection {
    fn from(_: RangeFull) -> Self {
        Self::Rows(Index::all())
    }
}

impl From<Vec<Index>> for Selection {
    fn from(indices: Vec<Index>) -> Self {
        Self::Composite(indices)
    }
}

macro_rules! impl_index_from_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Index {
                fn from(position: $t) -> Self {
                    Self::Single(saturate(position))
                }
            }

            impl From<Range<$t>> for Index {
                fn from(range: Range<$t>) -> Self {
                    Self::Range {
                        start: Some(saturate(range.start)),
                        stop: Some(saturate(range.end)),
                        step: None,
                    }
                }
            }

            impl From<RangeFrom<$t>> for Index {
                fn from(range: RangeFrom<$t>) -> Self {
                    Self::Range { start: Some(saturate(range.start)), stop: None, step: None }
                }
            }

            impl From<RangeTo<$t>> for Index {
                fn from(range: RangeTo<$t>) -> Self {
                    Self::Range { start: None, stop: Some(saturate(range.end)), step: None }
                }
            }

            impl From<Vec<$t>> for Index {
                fn from(positions: Vec<$t>) -> Self {
                    Self::List(positions.into_iter().map(saturate).collect())
                }
            }

            impl From<&[$t]> for Index {
                fn from(positions: &[$t]) -> Self {
                    Self::List(positions.iter().copied().map(saturate).collect())
                }
            }

            impl From<$t> for Selection {
                fn from(position: $t) -> Self {
                    Self::Rows(position.into())
                }
            }

            impl From<Range<$t>> for Selection {
                fn from(range: Range<$t>) -> Self {
                    Self::Rows(range.into())
                }
            }

            impl From<RangeFrom<$t>> for Selection {
                fn from(range: RangeFrom<$t>) -> Self {
                    Self::Rows(range.into())
                }
            }

            impl From<RangeTo<$t>> for Selection {
                fn from(range: RangeTo<$t>) -> Self {
                    Self::Rows(range.into())
                }
            }

            impl From<Vec<$t>> for Selection {
                fn from(positions: Vec<$t>) -> Self {
                    Self::Rows(positions.into())
                }
            }

            impl From<&[$t]> for Selection {
                fn from(positions: &[$t]) -> Self {
                    Self::Rows(positions.into())
                }
            }
        )*
    };
}

impl_index_from_int!(i32, i64, usize);

fn saturate<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

impl<R: Into<Index>> From<(R,)> for Selection {
    fn from((rows,): (R,)) -> Self {
        Self::Composite(vec![rows.into()])
    }
}

impl<R: Into<Index>, C: Into<Index>> From<(R, C)> for Selection {
    fn from((rows, columns): (R, C)) -> Self {
        Self::Composite(vec![rows.into(), columns.into()])
    }
}
