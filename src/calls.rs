use std::fmt;

use crate::config::Threshold;
use crate::matrix::SignedMatrix;

/// Direction of an association
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    /// Higher in controls
    Health,
    /// Higher in cases
    Disease,
}

impl Direction {
    pub fn sign(&self) -> i32 {
        match self {
            Direction::Health => -1,
            Direction::Disease => 1,
        }
    }

    /// Direction of a signed sum, `None` for zero
    pub fn from_sum(sum: i32) -> Option<Self> {
        match sum.signum() {
            -1 => Some(Direction::Health),
            1 => Some(Direction::Disease),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Health => f.write_str("healthy"),
            Direction::Disease => f.write_str("disease"),
        }
    }
}

/// Ternary call of one genus in one study
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Health,
    NotSignificant,
    Disease,
}

impl Call {
    /// The direction carried by the sign of `value`; zero and `NaN` carry none
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            Call::Disease
        } else if value < 0.0 {
            Call::Health
        } else {
            Call::NotSignificant
        }
    }

    pub fn sign(&self) -> i32 {
        match self {
            Call::Health => -1,
            Call::NotSignificant => 0,
            Call::Disease => 1,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Call::Health => Some(Direction::Health),
            Call::NotSignificant => None,
            Call::Disease => Some(Direction::Disease),
        }
    }

    pub fn is_significant(&self) -> bool {
        !matches!(self, Call::NotSignificant)
    }
}

/// Directional calls of every genus in every study, column-major
///
/// `None` marks a genus that was not observed in a study. Both `None` and
/// [`Call::NotSignificant`] are left out of every count.
#[derive(Debug, Clone, PartialEq)]
pub struct CallMatrix {
    n_genera: usize,
    columns: Vec<Vec<Option<Call>>>,
}

impl CallMatrix {
    /// Thresholds every cell of a signed matrix
    pub fn from_signed(matrix: &SignedMatrix, threshold: Threshold) -> Self {
        let columns = matrix
            .columns()
            .iter()
            .map(|column| {
                column
                    .iter()
                    .map(|cell| cell.map(|value| threshold.call(value)))
                    .collect()
            })
            .collect();
        Self {
            n_genera: matrix.n_genera(),
            columns,
        }
    }

    pub(crate) fn from_columns(n_genera: usize, columns: Vec<Vec<Option<Call>>>) -> Self {
        Self { n_genera, columns }
    }

    pub fn n_genera(&self) -> usize {
        self.n_genera
    }

    pub fn n_studies(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, study: usize) -> &[Option<Call>] {
        &self.columns[study]
    }

    pub fn columns(&self) -> &[Vec<Option<Call>>] {
        &self.columns
    }

    pub fn get(&self, genus: usize, study: usize) -> Option<Call> {
        self.columns[study][genus]
    }

    /// Sign of the call, with missing cells counted as zero
    pub fn sign(&self, genus: usize, study: usize) -> i32 {
        self.get(genus, study).map_or(0, |call| call.sign())
    }

    /// Number of significant (non-zero) calls in the whole matrix
    pub fn count_significant(&self) -> usize {
        self.columns
            .iter()
            .flatten()
            .filter(|cell| cell.is_some_and(|call| call.is_significant()))
            .count()
    }
}
