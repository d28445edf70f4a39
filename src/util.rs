// Parsing and arithmetic helpers shared by the analytics modules.
//
// Everything that has to cope with the dashboard's loosely-typed records
// (amounts stored as text, several timestamp shapes, nulls everywhere) lives
// here so the rest of the crate can work with plain `f64` and
// `NaiveDateTime` values.
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::debug;
use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Deserializer};

/// Parse a string-like amount into `f64`, tolerating the formatting noise
/// found in exported spreadsheets.
///
/// - Trims whitespace and rejects empty strings.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators (`,`) and non-breaking spaces.
/// - Returns `None` for anything that does not parse to a finite number.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| *c != ',' && *c != '\u{a0}' && *c != ' ')
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a timestamp in any of the shapes the backend emits.
///
/// Offsets are normalised to UTC and then dropped, date-only values map to
/// midnight.
pub fn parse_timestamp_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// First parseable timestamp among the candidates, in order.
pub fn first_timestamp(candidates: &[Option<&str>]) -> Option<NaiveDateTime> {
    candidates.iter().find_map(|c| parse_timestamp_safe(*c))
}

/// Serde adapter for amount fields: accepts numbers, numeric strings, empty
/// strings and nulls. Anything unusable becomes `None` instead of failing the
/// whole record.
pub fn de_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AmountRepr {
        Number(f64),
        Text(String),
    }

    let raw = Option::<AmountRepr>::deserialize(deserializer)?;
    Ok(match raw {
        Some(AmountRepr::Number(v)) if v.is_finite() => Some(v),
        Some(AmountRepr::Text(s)) => parse_f64_safe(Some(&s)),
        _ => None,
    })
}

/// Serde adapter for counters (email campaign statistics). Negative or
/// unparsable values count as zero.
pub fn de_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let amount = de_amount(deserializer)?;
    Ok(amount
        .filter(|v| *v > 0.0)
        .map(|v| v.round() as u64)
        .unwrap_or(0))
}

/// `numerator / denominator`, or 0 whenever the result would not be finite.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let r = numerator / denominator;
    if r.is_finite() {
        r
    } else {
        0.0
    }
}

/// `numerator / denominator * 100`, zero-guarded.
pub fn percent(numerator: f64, denominator: f64) -> f64 {
    safe_ratio(numerator, denominator) * 100.0
}

pub fn average(v: &[f64]) -> f64 {
    // Arithmetic mean; 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    v.iter().copied().collect::<OrderFreeSum>().total() / v.len() as f64
}

/// Sum of `f64` addends whose total depends only on the values added, never
/// on the order they arrived in.
///
/// Addends are kept and summed in ascending [`f64::total_cmp`] order when the
/// total is read.
#[derive(Debug, Clone, Default)]
pub struct OrderFreeSum {
    addends: Vec<f64>,
}

impl OrderFreeSum {
    pub fn add(&mut self, value: f64) {
        self.addends.push(value);
    }

    pub fn total(&self) -> f64 {
        self.sorted().iter().fold(0.0, |acc, v| acc + v)
    }

    fn sorted(&self) -> Vec<f64> {
        let mut values = self.addends.clone();
        values.sort_unstable_by(f64::total_cmp);
        values
    }
}

impl PartialEq for OrderFreeSum {
    fn eq(&self, other: &Self) -> bool {
        self.addends.len() == other.addends.len()
            && self
                .sorted()
                .iter()
                .zip(other.sorted().iter())
                .all(|(a, b)| a.total_cmp(b).is_eq())
    }
}

impl FromIterator<f64> for OrderFreeSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        OrderFreeSum {
            addends: iter.into_iter().collect(),
        }
    }
}

/// Whole days from `start` to `end`, negative when `end` precedes `start`.
pub fn days_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_days()
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Display-only: fixed decimals plus `en` thousands separators
    // (e.g. `1,234,567.89`). Report objects never carry formatted values.
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let mut res = match int_part.parse::<u64>() {
        Ok(int_val) => int_val.to_formatted_string(&Locale::en),
        Err(_) => {
            debug!("{} exceeds the grouping range, printed without separators", n);
            int_part.to_string()
        }
    };
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn amounts_tolerate_separators_and_reject_text() {
        assert_eq!(parse_f64_safe(Some(" 1,200.50 ")), Some(1200.5));
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(Some("n/a")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn timestamps_in_every_backend_shape() {
        assert_eq!(
            parse_timestamp_safe(Some("2024-10-15T08:30:00+02:00")),
            Some(at(2024, 10, 15, 6, 30, 0))
        );
        assert_eq!(
            parse_timestamp_safe(Some("2024-10-15T08:30:00.123")),
            Some(at(2024, 10, 15, 8, 30, 0) + chrono::Duration::milliseconds(123))
        );
        assert_eq!(
            parse_timestamp_safe(Some("2024-10-15 08:30:00")),
            Some(at(2024, 10, 15, 8, 30, 0))
        );
        assert_eq!(
            parse_timestamp_safe(Some("2024-10-15")),
            Some(at(2024, 10, 15, 0, 0, 0))
        );
        assert_eq!(parse_timestamp_safe(Some("15/10/2024")), None);
        assert_eq!(parse_timestamp_safe(Some("  ")), None);
    }

    #[test]
    fn first_timestamp_skips_unparseable_candidates() {
        let got = first_timestamp(&[Some("garbage"), None, Some("2023-01-02")]);
        assert_eq!(got, Some(at(2023, 1, 2, 0, 0, 0)));
        assert_eq!(first_timestamp(&[None, Some("")]), None);
    }

    #[test]
    fn ratios_never_produce_nan_or_infinity() {
        assert_eq!(safe_ratio(5.0, 0.0), 0.0);
        assert_eq!(safe_ratio(0.0, 0.0), 0.0);
        assert_eq!(percent(1.0, 4.0), 25.0);
        assert_eq!(safe_ratio(f64::MAX, f64::MIN_POSITIVE), 0.0);
        assert_eq!(average(&[]), 0.0);
    }

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-1500.0, 0), "-1,500");
        assert_eq!(format_number(0.0, 1), "0.0");
        assert_eq!(format_int(9855_u64), "9,855");
    }

    #[test]
    fn format_number_keeps_huge_magnitudes() {
        assert_eq!(format_number(1e20, 0), "100000000000000000000");
        assert_eq!(format_number(-2e19, 1), "-20000000000000000000.0");
        assert_eq!(format_number(f64::INFINITY, 0), "inf");
    }

    #[test]
    fn order_free_sum_ignores_addend_order() {
        let forward: OrderFreeSum = [0.1, 0.2, 0.3].into_iter().collect();
        let backward: OrderFreeSum = [0.3, 0.2, 0.1].into_iter().collect();
        assert_eq!(forward.total().to_bits(), backward.total().to_bits());
        assert_eq!(forward, backward);

        let mut built = OrderFreeSum::default();
        built.add(0.2);
        built.add(0.3);
        built.add(0.1);
        assert_eq!(built.total().to_bits(), forward.total().to_bits());
        assert_eq!(OrderFreeSum::default().total(), 0.0);
        assert_ne!(forward, [0.1, 0.2].into_iter().collect::<OrderFreeSum>());
    }
}
