//! Trailing analysis windows selected by short period codes.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};
use log::warn;
use serde::{Serialize, Serializer};
use std::fmt;

/// A trailing window ending at "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    /// `7d`, `30d`, `90d`: now minus N days.
    LastDays(u32),
    /// `1m`, `3m`, `6m`: now minus N calendar months.
    LastMonths(u32),
    /// `1y`: now minus one calendar year.
    LastYear,
    /// `ytd`: since 1 January of the current year.
    YearToDate,
    /// No date restriction.
    All,
}

impl Period {
    /// Parse a period code. Unknown codes fall back to [`Period::All`] so a
    /// bad selector widens the view instead of failing the computation.
    pub fn from_code(code: &str) -> Period {
        match Self::parse_known(code) {
            Some(p) => p,
            None => {
                warn!("unknown period code {:?}, no date filter applied", code);
                Period::All
            }
        }
    }

    /// Like [`Period::from_code`] but reports unknown codes as `None`.
    pub fn parse_known(code: &str) -> Option<Period> {
        match code.trim() {
            "7d" => Some(Period::LastDays(7)),
            "30d" => Some(Period::LastDays(30)),
            "90d" => Some(Period::LastDays(90)),
            "1m" => Some(Period::LastMonths(1)),
            "3m" => Some(Period::LastMonths(3)),
            "6m" => Some(Period::LastMonths(6)),
            "1y" => Some(Period::LastYear),
            "ytd" => Some(Period::YearToDate),
            "all" => Some(Period::All),
            _ => None,
        }
    }

    pub fn code(&self) -> String {
        match self {
            Period::LastDays(n) => format!("{}d", n),
            Period::LastMonths(n) => format!("{}m", n),
            Period::LastYear => "1y".to_string(),
            Period::YearToDate => "ytd".to_string(),
            Period::All => "all".to_string(),
        }
    }

    /// Earliest instant a record may carry and still fall inside the window.
    ///
    /// Month arithmetic clamps to the last day of shorter months
    /// (31 March minus one month is the last day of February).
    pub fn cutoff(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Period::LastDays(n) => now.checked_sub_signed(Duration::days(i64::from(*n))),
            Period::LastMonths(n) => now.checked_sub_months(Months::new(*n)),
            Period::LastYear => now.checked_sub_months(Months::new(12)),
            Period::YearToDate => NaiveDate::from_ymd_opt(now.year(), 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            Period::All => None,
        }
    }
}

impl Default for Period {
    fn default() -> Self {
        Period::LastMonths(3)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl Serialize for Period {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.code())
    }
}
