//! Synthetic monthly calendar attached to generated series.

use chrono::{Months, NaiveDate};
use serde::Serialize;

use crate::error::{ArimaError, Result};

/// First-of-month origin shared by every generated series.
pub fn default_origin() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Month-start dates `origin, origin + 1 month, ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthlyIndex {
    pub origin: NaiveDate,
    pub len: usize,
}

impl MonthlyIndex {
    pub fn new(origin: NaiveDate, len: usize) -> Self {
        Self { origin, len }
    }

    /// Date of position `i`. Positions past `len` are allowed so forecasts
    /// can be placed on the same calendar.
    pub fn date(&self, i: usize) -> Result<NaiveDate> {
        u32::try_from(i)
            .ok()
            .and_then(|m| self.origin.checked_add_months(Months::new(m)))
            .ok_or_else(|| ArimaError::DataError(format!("month offset {} out of range", i)))
    }
}

/// Generated values on a monthly calendar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatedSeries {
    pub index: MonthlyIndex,
    pub values: Vec<f64>,
}

impl DatedSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            index: MonthlyIndex::new(default_origin(), values.len()),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Training prefix and held-out suffix. `n_train` is clamped to the length.
    pub fn split(&self, n_train: usize) -> (&[f64], &[f64]) {
        self.values.split_at(n_train.min(self.values.len()))
    }
}
