use chrono::{Datelike, NaiveDate, Weekday};

/// Weekdays (Mon..=Fri) in `start..=end`. Zero when `end < start`.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> u32 {
    if end < start {
        return 0;
    }
    let total = (end - start).num_days() + 1;
    let full_weeks = total / 7;

    // Every full week has five weekdays; walk only the remainder.
    let remainder = (start + chrono::Duration::days(full_weeks * 7))
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as i64;

    u32::try_from(full_weeks * 5 + remainder).unwrap_or(u32::MAX)
}

/// Weekdays of `start..=end` that fall in calendar `year`.
pub fn business_days_in_year(start: NaiveDate, end: NaiveDate, year: i32) -> u32 {
    let (Some(first), Some(last)) = (NaiveDate::from_ymd_opt(year, 1, 1), NaiveDate::from_ymd_opt(year, 12, 31)) else {
        return 0;
    };
    business_days(start.max(first), end.min(last))
}

/// Inclusive date ranges share at least one day.
pub fn ranges_overlap(a: (NaiveDate, NaiveDate), b: (NaiveDate, NaiveDate)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekends_are_excluded() {
        // 2024-05-06 is a Monday.
        assert_eq!(business_days(d(2024, 5, 6), d(2024, 5, 10)), 5);
        assert_eq!(business_days(d(2024, 5, 6), d(2024, 5, 12)), 5);
        assert_eq!(business_days(d(2024, 5, 11), d(2024, 5, 12)), 0);
        assert_eq!(business_days(d(2024, 5, 10), d(2024, 5, 13)), 2);
        assert_eq!(business_days(d(2024, 5, 8), d(2024, 5, 8)), 1);
    }

    #[test]
    fn reversed_range_is_empty() {
        assert_eq!(business_days(d(2024, 5, 10), d(2024, 5, 6)), 0);
    }

    #[test]
    fn year_boundary_splits_the_count() {
        // Mon 2029-12-31 .. Fri 2030-01-04.
        assert_eq!(business_days_in_year(d(2029, 12, 31), d(2030, 1, 4), 2029), 1);
        assert_eq!(business_days_in_year(d(2029, 12, 31), d(2030, 1, 4), 2030), 4);
        assert_eq!(business_days_in_year(d(2029, 12, 31), d(2030, 1, 4), 2031), 0);
    }

    #[test]
    fn overlap_is_inclusive() {
        assert!(ranges_overlap((d(2024, 1, 1), d(2024, 1, 5)), (d(2024, 1, 5), d(2024, 1, 9))));
        assert!(!ranges_overlap((d(2024, 1, 1), d(2024, 1, 4)), (d(2024, 1, 5), d(2024, 1, 9))));
    }

    fn naive_count(start: NaiveDate, end: NaiveDate) -> u32 {
        start
            .iter_days()
            .take_while(|day| *day <= end)
            .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
            .count() as u32
    }

    proptest! {
        #[test]
        fn matches_day_by_day_count(offset in 0i64..3_000, len in 0i64..400) {
            let start = d(2020, 1, 1) + chrono::Duration::days(offset);
            let end = start + chrono::Duration::days(len);
            prop_assert_eq!(business_days(start, end), naive_count(start, end));
        }

        #[test]
        fn never_exceeds_calendar_days(offset in 0i64..3_000, len in 0i64..400) {
            let start = d(2020, 1, 1) + chrono::Duration::days(offset);
            let end = start + chrono::Duration::days(len);
            prop_assert!(i64::from(business_days(start, end)) <= len + 1);
        }
    }
}
