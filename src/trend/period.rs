//! Calendar bucketing. Every period is the half-open range `[start, end)`.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::PeriodType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn containing(pt: PeriodType, d: NaiveDate) -> Self {
        let start = bucket_start(pt, d);
        Self {
            start,
            end: next_start(pt, start),
        }
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        d >= self.start && d < self.end
    }
}

/// Start of the bucket holding `d`. Weeks start on Monday.
pub fn bucket_start(pt: PeriodType, d: NaiveDate) -> NaiveDate {
    match pt {
        PeriodType::Daily => d,
        PeriodType::Weekly => {
            let back = u64::from(d.weekday().num_days_from_monday());
            d.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN)
        }
        PeriodType::Monthly => d.with_day(1).unwrap_or(d),
    }
}

/// First day after the bucket that starts at `start`.
pub fn next_start(pt: PeriodType, start: NaiveDate) -> NaiveDate {
    let next = match pt {
        PeriodType::Daily => start.checked_add_days(Days::new(1)),
        PeriodType::Weekly => start.checked_add_days(Days::new(7)),
        PeriodType::Monthly => start.checked_add_months(Months::new(1)),
    };
    next.unwrap_or(NaiveDate::MAX)
}

/// Whole-bucket window covering `since..=until`.
pub fn window(pt: PeriodType, since: NaiveDate, until: NaiveDate) -> Period {
    Period {
        start: bucket_start(pt, since),
        end: next_start(pt, bucket_start(pt, until)),
    }
}

/// Lazy walk over consecutive buckets of a window.
#[derive(Debug, Clone)]
pub struct PeriodIter {
    pt: PeriodType,
    next: NaiveDate,
    end: NaiveDate,
}

impl PeriodIter {
    pub fn new(pt: PeriodType, since: NaiveDate, until: NaiveDate) -> Self {
        let w = window(pt, since, until);
        Self {
            pt,
            next: w.start,
            end: w.end,
        }
    }
}

impl Iterator for PeriodIter {
    type Item = Period;

    fn next(&mut self) -> Option<Period> {
        if self.next >= self.end {
            return None;
        }
        let start = self.next;
        let end = next_start(self.pt, start);
        // NaiveDate::MAX saturation would otherwise loop forever
        self.next = if end > start { end } else { self.end };
        Some(Period { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weeks_start_on_monday() {
        // 2024-03-07 is a Thursday
        assert_eq!(bucket_start(PeriodType::Weekly, d(2024, 3, 7)), d(2024, 3, 4));
        assert_eq!(bucket_start(PeriodType::Weekly, d(2024, 3, 4)), d(2024, 3, 4));
        assert_eq!(bucket_start(PeriodType::Weekly, d(2024, 3, 10)), d(2024, 3, 4));
    }

    #[test]
    fn months_roll_over_year_end() {
        let p = Period::containing(PeriodType::Monthly, d(2023, 12, 15));
        assert_eq!(p.start, d(2023, 12, 1));
        assert_eq!(p.end, d(2024, 1, 1));
    }

    #[test]
    fn iterator_covers_whole_buckets() {
        let ps: Vec<_> = PeriodIter::new(PeriodType::Weekly, d(2024, 3, 7), d(2024, 3, 12)).collect();
        assert_eq!(ps.len(), 2);
        assert_eq!(ps[0].start, d(2024, 3, 4));
        assert_eq!(ps[1].end, d(2024, 3, 18));
        assert_eq!(ps[0].end, ps[1].start);
    }

    #[test]
    fn single_day_window() {
        let ps: Vec<_> = PeriodIter::new(PeriodType::Daily, d(2024, 2, 29), d(2024, 2, 29)).collect();
        assert_eq!(ps, vec![Period { start: d(2024, 2, 29), end: d(2024, 3, 1) }]);
    }
}
