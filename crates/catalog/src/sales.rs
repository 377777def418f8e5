use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use bookwise_core::BookId;

/// Units of one book sold on one day (append-only, sourced from orders).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesObservation {
    pub book_id: BookId,
    pub date: NaiveDate,
    pub quantity: u32,
}

impl SalesObservation {
    pub fn new(book_id: BookId, date: NaiveDate, quantity: u32) -> Self {
        Self {
            book_id,
            date,
            quantity,
        }
    }
}

/// Length of a forecasting period.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodGranularity {
    Weekly,
    #[default]
    Monthly,
}

impl PeriodGranularity {
    /// Nominal number of days in one period (used to convert horizons and rates).
    pub fn days(self) -> u32 {
        match self {
            PeriodGranularity::Weekly => 7,
            PeriodGranularity::Monthly => 30,
        }
    }

    /// First day of the period that contains `date` for a series anchored at `anchor`.
    fn align(self, anchor: NaiveDate) -> NaiveDate {
        match self {
            PeriodGranularity::Weekly => anchor,
            PeriodGranularity::Monthly => anchor.with_day(1).unwrap_or(anchor),
        }
    }

    /// `[from, to]` covering the `periods` complete periods immediately before
    /// the period that contains `as_of`.
    ///
    /// Forecasts made on `as_of` therefore start at the current (partially
    /// elapsed) period, which is excluded from history.
    pub fn history_window(self, as_of: NaiveDate, periods: u32) -> (NaiveDate, NaiveDate) {
        let current = match self {
            PeriodGranularity::Weekly => as_of,
            PeriodGranularity::Monthly => self.align(as_of),
        };
        let to = current.pred_opt().unwrap_or(current);
        let from = match self {
            PeriodGranularity::Weekly => current
                .checked_sub_days(Days::new(7 * periods as u64))
                .unwrap_or(current),
            PeriodGranularity::Monthly => current
                .checked_sub_months(Months::new(periods))
                .unwrap_or(current),
        };
        (from, to)
    }

    /// Start of the period following the one that starts at `start`.
    pub fn advance(self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            PeriodGranularity::Weekly => start.checked_add_days(Days::new(7)),
            PeriodGranularity::Monthly => start.checked_add_months(Months::new(1)),
        }
    }
}

/// Contiguous per-period demand of one book; periods without sales are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSeries {
    pub book_id: BookId,
    pub granularity: PeriodGranularity,
    /// Start of the first period.
    pub start: NaiveDate,
    pub values: Vec<f64>,
}

impl DemandSeries {
    pub fn new(
        book_id: BookId,
        granularity: PeriodGranularity,
        start: NaiveDate,
        values: Vec<f64>,
    ) -> Self {
        Self {
            book_id,
            granularity,
            start: granularity.align(start),
            values,
        }
    }

    /// Bucket observations for `book_id` falling inside `[from, to]`.
    ///
    /// Observations for other books or outside the window are ignored. The last
    /// period is the one containing `to`, even if it is only partially elapsed.
    pub fn from_observations(
        book_id: BookId,
        observations: &[SalesObservation],
        from: NaiveDate,
        to: NaiveDate,
        granularity: PeriodGranularity,
    ) -> Self {
        let start = granularity.align(from);
        let mut starts = vec![start];
        if from <= to {
            let mut cursor = start;
            while let Some(next) = granularity.advance(cursor) {
                if next > to {
                    break;
                }
                starts.push(next);
                cursor = next;
            }
        }

        let mut values = vec![0.0; starts.len()];
        for obs in observations {
            if obs.book_id != book_id || obs.date < from || obs.date > to {
                continue;
            }
            // Period index = last start not after the observation date.
            let idx = starts.partition_point(|s| *s <= obs.date).saturating_sub(1);
            values[idx] += obs.quantity as f64;
        }

        Self {
            book_id,
            granularity,
            start,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Periods with at least one sale.
    pub fn selling_periods(&self) -> usize {
        self.values.iter().filter(|v| **v > 0.0).count()
    }

    /// Start date of period `index` (may lie in the future for forecast periods).
    pub fn period_start(&self, index: usize) -> NaiveDate {
        let mut date = self.start;
        for _ in 0..index {
            match self.granularity.advance(date) {
                Some(next) => date = next,
                None => break,
            }
        }
        date
    }

    /// Calendar month (1..=12) of period `index`.
    pub fn period_month(&self, index: usize) -> u32 {
        self.period_start(index).month()
    }

    /// The last `n` values (all of them when the series is shorter).
    pub fn tail(&self, n: usize) -> &[f64] {
        let start = self.values.len().saturating_sub(n);
        &self.values[start..]
    }
}
