//! Operating-profile expansion into GTFS calendar rows.

use chrono::{Duration, NaiveDate};
use gtfs_store::{Calendar, CalendarDate, Exception};
use sha2::{Digest, Sha256};

use super::bank_holidays::resolve_holiday_dates;
use super::options::Region;
use crate::txc::OperatingProfile;

/// One operating profile flattened over a concrete service window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExpandedProfile {
    pub weekdays: [bool; 7],
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Concrete extra operating dates, sorted and deduplicated
    pub added: Vec<NaiveDate>,
    /// Concrete non-operating dates; wins over `added` on conflict
    pub removed: Vec<NaiveDate>,
}

/// Flattens a profile: weekday flags from the regular day type, bank-holiday
/// names resolved through the region table, special days clamped to the
/// window. Unknown holiday names are skipped with a warning.
pub(crate) fn expand_profile(
    profile: &OperatingProfile,
    window: (NaiveDate, NaiveDate),
    region: Region,
    warnings: &mut Vec<String>,
) -> ExpandedProfile {
    let (start, end) = window;
    let weekdays = if profile.regular_days.holidays_only {
        [false; 7]
    } else {
        profile.regular_days.weekdays
    };

    let mut added = Vec::new();
    let mut removed = Vec::new();

    for name in &profile.bank_holiday_operation {
        match resolve_holiday_dates(region, name, start, end) {
            Some(dates) => added.extend(dates),
            None => warnings.push(format!("unknown bank holiday '{}' ignored", name)),
        }
    }
    for name in &profile.bank_holiday_non_operation {
        match resolve_holiday_dates(region, name, start, end) {
            Some(dates) => removed.extend(dates),
            None => warnings.push(format!("unknown bank holiday '{}' ignored", name)),
        }
    }

    for range in &profile.special_operation {
        added.extend(days_within(range.start, range.end, start, end));
    }
    for range in &profile.special_non_operation {
        removed.extend(days_within(range.start, range.end, start, end));
    }

    added.sort();
    added.dedup();
    removed.sort();
    removed.dedup();
    // Non-operation wins when a date lands on both sides.
    added.retain(|d| !removed.contains(d));

    ExpandedProfile { weekdays, start, end, added, removed }
}

fn days_within(
    range_start: NaiveDate,
    range_end: NaiveDate,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Vec<NaiveDate> {
    let from = range_start.max(window_start);
    let to = range_end.min(window_end);
    let mut days = Vec::new();
    let mut current = from;
    while current <= to {
        days.push(current);
        current += Duration::days(1);
    }
    days
}

/// Mints the service id of an expanded profile.
///
/// Content-addressed so identical profiles collapse to one id within and
/// across documents, and batch merging cannot collide.
pub(crate) fn mint_service_id(profile: &ExpandedProfile) -> String {
    let mut hasher = Sha256::new();
    for flag in profile.weekdays {
        hasher.update(if flag { b"1" } else { b"0" });
    }
    hasher.update(profile.start.to_string());
    hasher.update(profile.end.to_string());
    for date in &profile.added {
        hasher.update(b"+");
        hasher.update(date.to_string());
    }
    for date in &profile.removed {
        hasher.update(b"-");
        hasher.update(date.to_string());
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
    format!("svc_{}", hex)
}

/// Materializes the calendar row and its exception rows.
pub(crate) fn to_calendar_rows(
    service_id: &str,
    profile: &ExpandedProfile,
) -> (Calendar, Vec<CalendarDate>) {
    let calendar = Calendar {
        service_id: service_id.to_owned(),
        monday: profile.weekdays[0],
        tuesday: profile.weekdays[1],
        wednesday: profile.weekdays[2],
        thursday: profile.weekdays[3],
        friday: profile.weekdays[4],
        saturday: profile.weekdays[5],
        sunday: profile.weekdays[6],
        start_date: profile.start,
        end_date: profile.end,
        extras: Vec::new(),
    };
    let mut dates = Vec::new();
    for &date in &profile.added {
        dates.push(CalendarDate {
            service_id: service_id.to_owned(),
            date,
            exception_type: Exception::Added,
            extras: Vec::new(),
        });
    }
    for &date in &profile.removed {
        dates.push(CalendarDate {
            service_id: service_id.to_owned(),
            date,
            exception_type: Exception::Removed,
            extras: Vec::new(),
        });
    }
    dates.sort_by_key(|d| (d.date, d.exception_type.value()));
    (calendar, dates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txc::{DateRange, RegularDays};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weekday_profile() -> OperatingProfile {
        OperatingProfile {
            regular_days: RegularDays {
                weekdays: [true, true, true, true, true, false, false],
                holidays_only: false,
            },
            ..OperatingProfile::default()
        }
    }

    #[test]
    fn weekday_flags_carry_over() {
        let mut warnings = Vec::new();
        let expanded = expand_profile(
            &weekday_profile(),
            (date(2025, 1, 1), date(2025, 12, 31)),
            Region::England,
            &mut warnings,
        );
        assert_eq!(expanded.weekdays, [true, true, true, true, true, false, false]);
        assert!(expanded.added.is_empty());
        assert!(warnings.is_empty());

        let (calendar, dates) = to_calendar_rows("svc_x", &expanded);
        assert!(calendar.monday && !calendar.saturday);
        assert_eq!(calendar.start_date, date(2025, 1, 1));
        assert!(dates.is_empty());
    }

    #[test]
    fn bank_holidays_become_exceptions() {
        let mut profile = weekday_profile();
        profile.bank_holiday_non_operation = vec!["ChristmasDay".into(), "BoxingDay".into()];
        let mut warnings = Vec::new();
        let expanded = expand_profile(
            &profile,
            (date(2025, 1, 1), date(2025, 12, 31)),
            Region::England,
            &mut warnings,
        );
        assert_eq!(expanded.removed, vec![date(2025, 12, 25), date(2025, 12, 26)]);

        let (_, dates) = to_calendar_rows("svc_x", &expanded);
        assert_eq!(dates.len(), 2);
        assert!(dates.iter().all(|d| d.exception_type == Exception::Removed));
    }

    #[test]
    fn unknown_holiday_names_warn() {
        let mut profile = weekday_profile();
        profile.bank_holiday_operation = vec!["NotARealHoliday".into()];
        let mut warnings = Vec::new();
        let expanded = expand_profile(
            &profile,
            (date(2025, 1, 1), date(2025, 12, 31)),
            Region::England,
            &mut warnings,
        );
        assert!(expanded.added.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("NotARealHoliday"));
    }

    #[test]
    fn special_days_are_clamped_to_the_window() {
        let mut profile = weekday_profile();
        profile.special_non_operation =
            vec![DateRange { start: date(2024, 12, 30), end: date(2025, 1, 2) }];
        let mut warnings = Vec::new();
        let expanded = expand_profile(
            &profile,
            (date(2025, 1, 1), date(2025, 12, 31)),
            Region::England,
            &mut warnings,
        );
        assert_eq!(expanded.removed, vec![date(2025, 1, 1), date(2025, 1, 2)]);
    }

    #[test]
    fn removal_wins_over_addition() {
        let mut profile = weekday_profile();
        profile.special_operation =
            vec![DateRange { start: date(2025, 6, 1), end: date(2025, 6, 1) }];
        profile.special_non_operation =
            vec![DateRange { start: date(2025, 6, 1), end: date(2025, 6, 1) }];
        let mut warnings = Vec::new();
        let expanded = expand_profile(
            &profile,
            (date(2025, 1, 1), date(2025, 12, 31)),
            Region::England,
            &mut warnings,
        );
        assert!(expanded.added.is_empty());
        assert_eq!(expanded.removed, vec![date(2025, 6, 1)]);
    }

    #[test]
    fn holidays_only_clears_weekdays() {
        let mut profile = weekday_profile();
        profile.regular_days.holidays_only = true;
        profile.bank_holiday_operation = vec!["GoodFriday".into()];
        let mut warnings = Vec::new();
        let expanded = expand_profile(
            &profile,
            (date(2025, 1, 1), date(2025, 12, 31)),
            Region::England,
            &mut warnings,
        );
        assert_eq!(expanded.weekdays, [false; 7]);
        assert_eq!(expanded.added, vec![date(2025, 4, 18)]);
    }

    #[test]
    fn identical_profiles_mint_identical_ids() {
        let mut warnings = Vec::new();
        let window = (date(2025, 1, 1), date(2025, 12, 31));
        let a = expand_profile(&weekday_profile(), window, Region::England, &mut warnings);
        let b = expand_profile(&weekday_profile(), window, Region::England, &mut warnings);
        assert_eq!(mint_service_id(&a), mint_service_id(&b));

        let mut other = weekday_profile();
        other.regular_days.weekdays[5] = true;
        let c = expand_profile(&other, window, Region::England, &mut warnings);
        assert_ne!(mint_service_id(&a), mint_service_id(&c));
    }
}
