use super::{month_anchor::MonthAnchor, subscriptions::ValidationError};

/// Inclusive `[start, end]` range of months used to total subscription spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    start: MonthAnchor,
    end: MonthAnchor,
}

impl MonthWindow {
    pub fn new(start: MonthAnchor, end: MonthAnchor) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvalidInterval);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> MonthAnchor {
        self.start
    }

    pub fn end(&self) -> MonthAnchor {
        self.end
    }

    /// Whether a subscription billed from `start_date` to `end_date` counts
    /// towards spend in this window.
    ///
    /// Closed subscriptions count when their interval overlaps the window.
    /// Open-ended subscriptions count only when they start inside the window;
    /// one that started earlier and is still running is not included. The
    /// postgres aggregation applies the same predicate in SQL.
    pub fn includes(&self, start_date: MonthAnchor, end_date: Option<MonthAnchor>) -> bool {
        match end_date {
            Some(end_date) => start_date <= self.end && end_date >= self.start,
            None => self.start <= start_date && start_date <= self.end,
        }
    }
}
