use chrono::NaiveDate;
use serde::Serialize;

use crate::service::error::EngineError;

/// Inclusive calendar interval `[start, end]`.
///
/// Construction rejects `end < start`, so every `DateRange` in circulation is
/// well formed and the overlap test below is total.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        if end < start {
            return Err(EngineError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    /// Jan 1 ..= Dec 31 of `year`.
    pub fn year(year: i32) -> Result<Self, EngineError> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(EngineError::InvalidYear(year))?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31).ok_or(EngineError::InvalidYear(year))?;
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, both endpoints included.
    pub fn days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1) as u32
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn range(a: u32, b: u32) -> DateRange {
        DateRange::new(d(a), d(b)).unwrap()
    }

    #[rstest]
    #[case(range(1, 5), range(5, 10), true)]
    #[case(range(1, 5), range(6, 10), false)]
    #[case(range(3, 4), range(1, 10), true)]
    #[case(range(10, 15), range(15, 20), true)]
    #[case(range(10, 15), range(16, 20), false)]
    #[case(range(7, 7), range(7, 7), true)]
    fn overlap_is_inclusive_and_symmetric(
        #[case] a: DateRange,
        #[case] b: DateRange,
        #[case] expected: bool,
    ) {
        assert_eq!(a.overlaps(&b), expected);
        assert_eq!(b.overlaps(&a), expected);
    }

    #[test]
    fn a_range_overlaps_itself() {
        let r = range(2, 9);
        assert!(r.overlaps(&r));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let err = DateRange::new(d(5), d(4)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInterval { .. }));
    }

    #[rstest]
    #[case(range(1, 1), 1)]
    #[case(range(10, 15), 6)]
    fn days_counts_both_endpoints(#[case] r: DateRange, #[case] expected: u32) {
        assert_eq!(r.days(), expected);
    }

    #[test]
    fn leap_year_has_366_days() {
        assert_eq!(DateRange::year(2024).unwrap().days(), 366);
        assert_eq!(DateRange::year(2023).unwrap().days(), 365);
    }

    #[test]
    fn contains_checks_bounds() {
        let r = range(10, 15);
        assert!(r.contains(d(10)));
        assert!(r.contains(d(15)));
        assert!(!r.contains(d(16)));
    }
}
