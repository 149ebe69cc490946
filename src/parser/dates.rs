//! Date literal parsing and relative date ranges.

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime};

use crate::types::Value;

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
];

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parses a date or datetime string.
///
/// Accepts ISO dates and datetimes, `YYYY/MM/DD`, `MM/DD/YYYY`, spelled-out
/// month names and the words `today`, `yesterday` and `tomorrow`.
#[must_use]
pub fn parse_date_value(text: &str, today: NaiveDate) -> Option<Value> {
    let text = text.trim();
    match text.to_ascii_lowercase().as_str() {
        "today" => return Some(Value::Date(today)),
        "yesterday" => return today.pred_opt().map(Value::Date),
        "tomorrow" => return today.succ_opt().map(Value::Date),
        _ => {}
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(Value::Datetime(dt));
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .map(Value::Date)
}

/// First instant of a day.
#[must_use]
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Last microsecond of a day.
#[must_use]
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    let last = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN);
    date.and_time(last)
}

/// Offset word in `is <offset> <unit>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOffset {
    /// `prior`, `previous`, `last`
    Previous,
    /// `current`, `this`
    Current,
    /// `next`
    Next,
}

impl RangeOffset {
    /// Parses an offset word.
    #[must_use]
    pub fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "prior" | "previous" | "last" => Some(RangeOffset::Previous),
            "current" | "this" => Some(RangeOffset::Current),
            "next" => Some(RangeOffset::Next),
            _ => None,
        }
    }

    fn delta(self) -> i32 {
        match self {
            RangeOffset::Previous => -1,
            RangeOffset::Current => 0,
            RangeOffset::Next => 1,
        }
    }
}

/// Unit word in `is <offset> <unit>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeUnit {
    Year,
    /// Year to date.
    Ytd,
    /// Calendar quarter.
    Qtr,
    Month,
    /// Month to date.
    Mtd,
    Day,
}

impl RangeUnit {
    /// Parses a unit word.
    #[must_use]
    pub fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "year" => Some(RangeUnit::Year),
            "ytd" => Some(RangeUnit::Ytd),
            "qtr" => Some(RangeUnit::Qtr),
            "month" => Some(RangeUnit::Month),
            "mtd" => Some(RangeUnit::Mtd),
            "day" => Some(RangeUnit::Day),
            _ => None,
        }
    }
}

/// Computes the inclusive date range for `is <offset> <unit>`.
///
/// The to-date units (`ytd`, `mtd`) end on the shifted reference day rather
/// than the end of the period. Returns `None` if the range falls outside the
/// representable calendar.
#[must_use]
pub fn date_range(offset: RangeOffset, unit: RangeUnit, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let delta = offset.delta();
    match unit {
        RangeUnit::Year | RangeUnit::Ytd => {
            let anchor = shift_months(today, delta * 12)?;
            let start = NaiveDate::from_ymd_opt(anchor.year(), 1, 1)?;
            let end = if unit == RangeUnit::Year {
                NaiveDate::from_ymd_opt(anchor.year(), 12, 31)?
            } else {
                anchor
            };
            Some((start, end))
        }
        RangeUnit::Qtr => {
            let anchor = shift_months(today, delta * 3)?;
            let first_month = (anchor.month0() / 3) * 3 + 1;
            let start = NaiveDate::from_ymd_opt(anchor.year(), first_month, 1)?;
            let end = start.checked_add_months(Months::new(3))?.pred_opt()?;
            Some((start, end))
        }
        RangeUnit::Month | RangeUnit::Mtd => {
            let anchor = shift_months(today, delta)?;
            let start = anchor.with_day(1)?;
            let end = if unit == RangeUnit::Month {
                start.checked_add_months(Months::new(1))?.pred_opt()?
            } else {
                anchor
            };
            Some((start, end))
        }
        RangeUnit::Day => {
            let day = match offset {
                RangeOffset::Previous => today.checked_sub_days(Days::new(1))?,
                RangeOffset::Current => today,
                RangeOffset::Next => today.checked_add_days(Days::new(1))?,
            };
            Some((day, day))
        }
    }
}

fn shift_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let magnitude = Months::new(months.unsigned_abs());
    if months < 0 {
        date.checked_sub_months(magnitude)
    } else {
        date.checked_add_months(magnitude)
    }
}
