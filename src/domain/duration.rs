use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Duration {
    pub hours: u64,
    pub minutes: u32,
    pub seconds: u32,
    pub is_negative: bool,
}

impl Duration {
    pub const ZERO: Duration = Duration {
        hours: 0,
        minutes: 0,
        seconds: 0,
        is_negative: false,
    };

    pub fn from_seconds(total_seconds: i64) -> Self {
        let magnitude = total_seconds.unsigned_abs();
        Self {
            hours: magnitude / 3600,
            minutes: ((magnitude % 3600) / 60) as u32,
            seconds: (magnitude % 60) as u32,
            is_negative: total_seconds < 0,
        }
    }

    pub fn total_seconds(&self) -> i64 {
        let magnitude = self.hours as i64 * 3600 + self.minutes as i64 * 60 + self.seconds as i64;
        if self.is_negative { -magnitude } else { magnitude }
    }

    pub fn format_hms(&self) -> String {
        format!(
            "{}{:02}:{:02}:{:02}",
            if self.is_negative { "-" } else { "" },
            self.hours,
            self.minutes,
            self.seconds
        )
    }

    // Compact variant for narrow surfaces; seconds are dropped, not rounded.
    pub fn format_hm(&self) -> String {
        format!(
            "{}{:02}:{:02}",
            if self.is_negative { "-" } else { "" },
            self.hours,
            self.minutes
        )
    }
}

pub fn parse_hms(value: &str) -> Option<Duration> {
    let trimmed = value.trim();
    let (is_negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let mut split = digits.split(':');
    let hours = split.next()?.parse::<u64>().ok()?;
    let minutes = split.next()?.parse::<u32>().ok()?;
    let seconds = split.next()?.parse::<u32>().ok()?;
    if split.next().is_some() || minutes > 59 || seconds > 59 {
        return None;
    }

    Some(Duration {
        hours,
        minutes,
        seconds,
        is_negative,
    })
}
