//! Campaign calendar used to date pins.
//!
//! The map core never looks inside a date: it only needs a sortable key and
//! a display label, which is what [`DateSystem`] provides. [`DsaCalendar`] is
//! the campaign's reckoning: twelve months of 30 days followed by five
//! nameless days, years counted "BF".
use crate::error::MapError;
use crate::models::{DateKey, PinDate};

pub trait DateSystem {
    type Date;

    fn parse(&self, input: &str) -> Option<Self::Date>;

    /// Single scalar with the calendar's total order.
    fn sort_key(&self, date: &Self::Date) -> DateKey;

    fn format(&self, date: &Self::Date) -> String;

    /// Resolve free-form form input into the key/label pair stored on a pin.
    /// Blank input means "undated".
    fn pin_date(&self, input: &str) -> Result<Option<PinDate>, MapError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let date = self
            .parse(trimmed)
            .ok_or_else(|| MapError::Validation(format!("unrecognised date: {trimmed}")))?;
        Ok(Some(PinDate {
            key: self.sort_key(&date),
            label: self.format(&date),
        }))
    }
}

pub struct Month {
    pub name: &'static str,
    pub short: &'static str,
    pub days: u8,
}

pub const MONTHS: [Month; 13] = [
    Month { name: "Praios", short: "PRA", days: 30 },
    Month { name: "Rondra", short: "RON", days: 30 },
    Month { name: "Efferd", short: "EFF", days: 30 },
    Month { name: "Travia", short: "TRA", days: 30 },
    Month { name: "Boron", short: "BOR", days: 30 },
    Month { name: "Hesinde", short: "HES", days: 30 },
    Month { name: "Firun", short: "FIR", days: 30 },
    Month { name: "Tsa", short: "TSA", days: 30 },
    Month { name: "Phex", short: "PHE", days: 30 },
    Month { name: "Peraine", short: "PER", days: 30 },
    Month { name: "Ingerimm", short: "ING", days: 30 },
    Month { name: "Rahja", short: "RAH", days: 30 },
    Month { name: "Namenlose Tage", short: "NL", days: 5 },
];

/// Index of the five nameless days at the end of the year.
const NAMELESS: u8 = 12;

pub const WEEKDAYS: [&str; 7] = [
    "Windstag",
    "Erdstag",
    "Markttag",
    "Praiostag",
    "Rohalstag",
    "Feuertag",
    "Wassertag",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DsaDate {
    pub day: u8,
    /// 0-based; 12 is the nameless days.
    pub month: u8,
    pub year: i32,
}

impl DsaDate {
    pub fn new(day: u8, month: u8, year: i32) -> Option<Self> {
        let max_day = MONTHS.get(month as usize)?.days;
        if day < 1 || day > max_day {
            return None;
        }
        Some(DsaDate { day, month, year })
    }

    pub fn day_of_year(&self) -> i64 {
        self.month as i64 * 30 + self.day as i64
    }

    /// The week runs on through month boundaries; 1. Praios 0 BF is a Windstag.
    pub fn weekday(&self) -> &'static str {
        let total_days = self.year as i64 * 365 + self.day_of_year() - 1;
        WEEKDAYS[total_days.rem_euclid(7) as usize]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DsaCalendar;

impl DateSystem for DsaCalendar {
    type Date = DsaDate;

    /// Accepts "15. Praios 1049 BF", "3. NL 1049", "2. Namenloser Tag 1049 BF"
    /// and a bare year ("1049 BF"), which means 1. Praios of that year.
    fn parse(&self, input: &str) -> Option<DsaDate> {
        let text = strip_era(input.trim());

        let Some((day, rest)) = text.split_once('.') else {
            let year = text.parse().ok()?;
            return DsaDate::new(1, 0, year);
        };

        let day: u8 = day.trim().parse().ok()?;
        let mut words: Vec<&str> = rest.split_whitespace().collect();
        let year: i32 = words.pop()?.parse().ok()?;
        let month_name = words.join(" ").to_lowercase();
        if month_name.is_empty() {
            return None;
        }
        let month = month_index(&month_name)?;
        DsaDate::new(day, month, year)
    }

    fn sort_key(&self, date: &DsaDate) -> DateKey {
        DateKey(date.year as i64 * 400 + date.day_of_year())
    }

    fn format(&self, date: &DsaDate) -> String {
        if date.month == NAMELESS {
            return format!("{}. Namenloser Tag {} BF", date.day, date.year);
        }
        match MONTHS.get(date.month as usize) {
            Some(month) => format!("{}. {} {} BF", date.day, month.name, date.year),
            None => String::new(),
        }
    }
}

fn strip_era(text: &str) -> &str {
    let lower = text.to_ascii_lowercase();
    if lower.ends_with("bf") {
        text[..text.len() - 2].trim_end()
    } else {
        text
    }
}

fn month_index(name: &str) -> Option<u8> {
    if name == "namenloser tag" {
        return Some(NAMELESS);
    }
    MONTHS
        .iter()
        .position(|m| m.name.to_lowercase() == name || m.short.to_lowercase() == name)
        .map(|i| i as u8)
}
