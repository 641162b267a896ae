// 📅 Periods - integer year-month stamps (YYYYMM)
// Business time in every relation is a month, never a day.

use crate::error::{AnalysisError, AnalysisResult};
use chrono::{Datelike, Months, NaiveDate};

/// Year-month stamp, e.g. 202501
pub type Period = u32;

/// Convert a YYYYMM stamp to the first day of that month
pub fn to_date(period: Period) -> AnalysisResult<NaiveDate> {
    let year = (period / 100) as i32;
    let month = period % 100;

    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| AnalysisError::InvalidPeriodRange {
        reason: format!("'{}' is not a valid YYYYMM period", period),
    })
}

fn from_date(date: NaiveDate) -> Period {
    date.year() as u32 * 100 + date.month()
}

/// Every month from `start` to `end`, both inclusive
pub fn month_range(start: Period, end: Period) -> AnalysisResult<Vec<Period>> {
    let first = to_date(start)?;
    let last = to_date(end)?;

    if first > last {
        return Err(AnalysisError::InvalidPeriodRange {
            reason: format!("start {} is after end {}", start, end),
        });
    }

    let mut periods = Vec::new();
    let mut current = first;
    while current <= last {
        periods.push(from_date(current));
        current = match current.checked_add_months(Months::new(1)) {
            Some(next) => next,
            None => break,
        };
    }

    Ok(periods)
}

/// Periods for a series query: an explicit list wins, otherwise both bounds are required
pub fn resolve_periods(
    explicit: Option<&[Period]>,
    start: Option<Period>,
    end: Option<Period>,
) -> AnalysisResult<Vec<Period>> {
    match (explicit, start, end) {
        (Some(list), _, _) if !list.is_empty() => Ok(list.to_vec()),
        (_, Some(s), Some(e)) => month_range(s, e),
        _ => Err(AnalysisError::InvalidPeriodRange {
            reason: "provide an explicit period list or both start and end".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_range_crosses_year() {
        let periods = month_range(202411, 202502).unwrap();
        assert_eq!(periods, vec![202411, 202412, 202501, 202502]);
    }

    #[test]
    fn test_month_range_single() {
        assert_eq!(month_range(202501, 202501).unwrap(), vec![202501]);
    }

    #[test]
    fn test_month_range_rejects_inverted_and_invalid() {
        assert!(month_range(202503, 202501).is_err());
        assert!(month_range(202513, 202601).is_err());
    }

    #[test]
    fn test_resolve_periods() {
        assert_eq!(
            resolve_periods(Some(&[202503, 202501][..]), None, None).unwrap(),
            vec![202503, 202501]
        );
        assert_eq!(
            resolve_periods(None, Some(202501), Some(202503)).unwrap(),
            vec![202501, 202502, 202503]
        );
        assert!(matches!(
            resolve_periods(None, Some(202501), None),
            Err(AnalysisError::InvalidPeriodRange { .. })
        ));
    }
}
