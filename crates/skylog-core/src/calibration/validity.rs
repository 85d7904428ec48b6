use chrono::{DateTime, Duration, Months, Utc};

use crate::error::{Result, SkylogError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowUnit {
    Day,
    Week,
    Month,
    Year,
}

/// How far from a calibration frame's capture time a light may be and still
/// use it, e.g. "3 months".
///
/// Months are calendar months: adding one month to Jan 31 gives the last
/// day of February. A year is twelve calendar months.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidityWindow {
    pub amount: u32,
    pub unit: WindowUnit,
}

impl ValidityWindow {
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || SkylogError::InvalidValidityWindow(text.to_string());
        let mut parts = text.split_whitespace();
        let amount: u32 = parts
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(invalid)?;
        let unit = match parts.next().map(|u| u.to_ascii_lowercase()).as_deref() {
            Some("day" | "days") => WindowUnit::Day,
            Some("week" | "weeks") => WindowUnit::Week,
            Some("month" | "months") => WindowUnit::Month,
            Some("year" | "years") => WindowUnit::Year,
            _ => return Err(invalid()),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        let window = Self { amount, unit };
        window.months().ok_or_else(invalid)?;
        Ok(window)
    }

    /// Calendar months spanned; `None` when the count does not fit.
    fn months(&self) -> Option<u32> {
        match self.unit {
            WindowUnit::Year => self.amount.checked_mul(12),
            _ => Some(self.amount),
        }
    }

    fn shift(&self, t: DateTime<Utc>, forward: bool) -> Option<DateTime<Utc>> {
        let n = self.amount;
        match self.unit {
            WindowUnit::Day | WindowUnit::Week => {
                let days = i64::from(n) * if self.unit == WindowUnit::Week { 7 } else { 1 };
                let delta = Duration::days(days);
                if forward {
                    t.checked_add_signed(delta)
                } else {
                    t.checked_sub_signed(delta)
                }
            }
            WindowUnit::Month | WindowUnit::Year => {
                let months = Months::new(self.months()?);
                if forward {
                    t.checked_add_months(months)
                } else {
                    t.checked_sub_months(months)
                }
            }
        }
    }

    /// True when `light_time` lies within the window around `frame_time`.
    pub fn admits(&self, frame_time: DateTime<Utc>, light_time: DateTime<Utc>) -> bool {
        let lo = self.shift(frame_time, false).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let hi = self.shift(frame_time, true).unwrap_or(DateTime::<Utc>::MAX_UTC);
        lo <= light_time && light_time <= hi
    }
}

impl std::fmt::Display for ValidityWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let unit = match self.unit {
            WindowUnit::Day => "day",
            WindowUnit::Week => "week",
            WindowUnit::Month => "month",
            WindowUnit::Year => "year",
        };
        let plural = if self.amount == 1 { "" } else { "s" };
        write!(f, "{} {unit}{plural}", self.amount)
    }
}
