//! Concrete bank-holiday dates per UK nation.
//!
//! TXC operating profiles name holidays symbolically (`<SpringBank/>`,
//! `<AllBankHolidays/>`); this module turns those names into dates for a
//! service window. Tables are computed per (region, year) on first use and
//! cached immutably for the process lifetime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDate, Weekday};
use lazy_static::lazy_static;

use super::options::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Holiday {
    NewYearsDay,
    NewYearsDayHoliday,
    Jan2ndScotland,
    Jan2ndScotlandHoliday,
    StPatricksDay,
    GoodFriday,
    EasterMonday,
    MayDay,
    SpringBank,
    BattleOfTheBoyne,
    AugustBankHolidayScotland,
    LateSummerBankHolidayNotScotland,
    StAndrewsDay,
    StAndrewsDayHoliday,
    ChristmasEve,
    ChristmasDay,
    ChristmasDayHoliday,
    BoxingDay,
    BoxingDayHoliday,
    NewYearsEve,
}

use Holiday::*;

lazy_static! {
    static ref HOLIDAY_CACHE: Mutex<HashMap<(Region, i32), Arc<HashMap<Holiday, NaiveDate>>>> =
        Mutex::new(HashMap::new());
}

/// Resolves one symbolic TXC holiday name to every matching date inside
/// `[start, end]`. Group names (`AllBankHolidays`, `HolidayMondays`, …)
/// expand to their members. Returns `None` for names this table does not know.
pub(crate) fn resolve_holiday_dates(
    region: Region,
    name: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Option<Vec<NaiveDate>> {
    let kinds = kinds_for_name(region, name)?;
    let mut dates = Vec::new();
    for year in start.year()..=end.year() {
        let table = year_table(region, year);
        for kind in &kinds {
            if let Some(&date) = table.get(kind) {
                if start <= date && date <= end && !dates.contains(&date) {
                    dates.push(date);
                }
            }
        }
    }
    dates.sort();
    Some(dates)
}

fn kinds_for_name(region: Region, name: &str) -> Option<Vec<Holiday>> {
    let single = match name {
        "NewYearsDay" => Some(NewYearsDay),
        "NewYearsDayHoliday" => Some(NewYearsDayHoliday),
        "Jan2ndScotland" => Some(Jan2ndScotland),
        "Jan2ndScotlandHoliday" => Some(Jan2ndScotlandHoliday),
        "StPatricksDay" => Some(StPatricksDay),
        "GoodFriday" => Some(GoodFriday),
        "EasterMonday" => Some(EasterMonday),
        "MayDay" => Some(MayDay),
        "SpringBank" => Some(SpringBank),
        "BattleOfTheBoyne" => Some(BattleOfTheBoyne),
        "AugustBankHolidayScotland" => Some(AugustBankHolidayScotland),
        "LateSummerBankHolidayNotScotland" => Some(LateSummerBankHolidayNotScotland),
        "StAndrewsDay" => Some(StAndrewsDay),
        "StAndrewsDayHoliday" => Some(StAndrewsDayHoliday),
        "ChristmasEve" => Some(ChristmasEve),
        "ChristmasDay" => Some(ChristmasDay),
        "ChristmasDayHoliday" => Some(ChristmasDayHoliday),
        "BoxingDay" => Some(BoxingDay),
        "BoxingDayHoliday" => Some(BoxingDayHoliday),
        "NewYearsEve" => Some(NewYearsEve),
        _ => None,
    };
    if let Some(kind) = single {
        return Some(vec![kind]);
    }
    match name {
        "AllBankHolidays" => Some(region_holidays(region)),
        "AllHolidaysExceptChristmas" => Some(
            region_holidays(region)
                .into_iter()
                .filter(|h| {
                    !matches!(
                        h,
                        ChristmasEve
                            | ChristmasDay
                            | ChristmasDayHoliday
                            | BoxingDay
                            | BoxingDayHoliday
                            | NewYearsEve
                    )
                })
                .collect(),
        ),
        "Christmas" => Some(vec![ChristmasDay, BoxingDay]),
        "DisplacementHolidays" => Some(match region {
            Region::Scotland => vec![
                NewYearsDayHoliday,
                Jan2ndScotlandHoliday,
                StAndrewsDayHoliday,
                ChristmasDayHoliday,
                BoxingDayHoliday,
            ],
            _ => vec![NewYearsDayHoliday, ChristmasDayHoliday, BoxingDayHoliday],
        }),
        "HolidayMondays" => Some(match region {
            Region::Scotland => vec![EasterMonday, MayDay, SpringBank, AugustBankHolidayScotland],
            _ => vec![EasterMonday, MayDay, SpringBank, LateSummerBankHolidayNotScotland],
        }),
        "EarlyRunOff" | "EarlyRunOffDays" => Some(vec![ChristmasEve, NewYearsEve]),
        _ => None,
    }
}

/// The holidays actually observed in a region, displacement days included.
fn region_holidays(region: Region) -> Vec<Holiday> {
    let mut holidays = vec![
        NewYearsDay,
        NewYearsDayHoliday,
        GoodFriday,
        MayDay,
        SpringBank,
        ChristmasDay,
        ChristmasDayHoliday,
        BoxingDay,
        BoxingDayHoliday,
    ];
    match region {
        Region::Scotland => holidays.extend([
            Jan2ndScotland,
            Jan2ndScotlandHoliday,
            AugustBankHolidayScotland,
            StAndrewsDay,
            StAndrewsDayHoliday,
        ]),
        Region::NorthernIreland => holidays.extend([
            EasterMonday,
            LateSummerBankHolidayNotScotland,
            StPatricksDay,
            BattleOfTheBoyne,
        ]),
        Region::England | Region::Wales => {
            holidays.extend([EasterMonday, LateSummerBankHolidayNotScotland])
        }
    }
    holidays
}

fn year_table(region: Region, year: i32) -> Arc<HashMap<Holiday, NaiveDate>> {
    if let Ok(mut cache) = HOLIDAY_CACHE.lock() {
        return cache
            .entry((region, year))
            .or_insert_with(|| Arc::new(compute_year(year)))
            .clone();
    }
    Arc::new(compute_year(year))
}

fn compute_year(year: i32) -> HashMap<Holiday, NaiveDate> {
    let mut table = HashMap::new();

    if let (Some(jan1), Some(jan2)) = (ymd(year, 1, 1), ymd(year, 1, 2)) {
        let (ny_observed, jan2_observed) = displaced_pair(jan1, jan2);
        table.insert(NewYearsDay, jan1);
        table.insert(NewYearsDayHoliday, ny_observed);
        table.insert(Jan2ndScotland, jan2);
        table.insert(Jan2ndScotlandHoliday, jan2_observed);
    }

    if let Some(easter) = easter_sunday(year) {
        table.insert(GoodFriday, easter - chrono::Duration::days(2));
        table.insert(EasterMonday, easter + chrono::Duration::days(1));
    }

    if let Some(date) = first_weekday_of(year, 5, Weekday::Mon) {
        table.insert(MayDay, date);
    }
    if let Some(date) = last_weekday_of(year, 5, Weekday::Mon) {
        table.insert(SpringBank, date);
    }
    if let Some(date) = first_weekday_of(year, 8, Weekday::Mon) {
        table.insert(AugustBankHolidayScotland, date);
    }
    if let Some(date) = last_weekday_of(year, 8, Weekday::Mon) {
        table.insert(LateSummerBankHolidayNotScotland, date);
    }

    if let Some(date) = ymd(year, 3, 17) {
        table.insert(StPatricksDay, date);
    }
    if let Some(date) = ymd(year, 7, 12) {
        table.insert(BattleOfTheBoyne, date);
    }

    if let Some(date) = ymd(year, 11, 30) {
        table.insert(StAndrewsDay, date);
        table.insert(StAndrewsDayHoliday, roll_forward(date, &[]));
    }

    if let Some(date) = ymd(year, 12, 24) {
        table.insert(ChristmasEve, date);
    }
    if let (Some(dec25), Some(dec26)) = (ymd(year, 12, 25), ymd(year, 12, 26)) {
        let (christmas_observed, boxing_observed) = displaced_pair(dec25, dec26);
        table.insert(ChristmasDay, dec25);
        table.insert(ChristmasDayHoliday, christmas_observed);
        table.insert(BoxingDay, dec26);
        table.insert(BoxingDayHoliday, boxing_observed);
    }
    if let Some(date) = ymd(year, 12, 31) {
        table.insert(NewYearsEve, date);
    }

    table
}

/// Observed dates for two consecutive holidays. A holiday that already falls
/// on a weekday keeps its date; a displaced one takes the next working day
/// that the other has not claimed.
fn displaced_pair(first: NaiveDate, second: NaiveDate) -> (NaiveDate, NaiveDate) {
    let mut taken = Vec::new();
    if !is_weekend(first) {
        taken.push(first);
    }
    if !is_weekend(second) {
        taken.push(second);
    }
    let first_observed =
        if is_weekend(first) { roll_forward(first, &taken) } else { first };
    taken.push(first_observed);
    let second_observed =
        if is_weekend(second) { roll_forward(second, &taken) } else { second };
    (first_observed, second_observed)
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The first working day on or after `date` not already claimed.
fn roll_forward(date: NaiveDate, taken: &[NaiveDate]) -> NaiveDate {
    let mut current = date;
    while is_weekend(current) || taken.contains(&current) {
        current += chrono::Duration::days(1);
    }
    current
}

/// Anonymous Gregorian computus.
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = ((h + l - 7 * m + 114) % 31) + 1;
    ymd(year, month as u32, day as u32)
}

fn first_weekday_of(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let mut date = ymd(year, month, 1)?;
    while date.weekday() != weekday {
        date += chrono::Duration::days(1);
    }
    Some(date)
}

fn last_weekday_of(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let next_month = if month == 12 { ymd(year + 1, 1, 1) } else { ymd(year, month + 1, 1) };
    let mut date = next_month? - chrono::Duration::days(1);
    while date.weekday() != weekday {
        date -= chrono::Duration::days(1);
    }
    Some(date)
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}
