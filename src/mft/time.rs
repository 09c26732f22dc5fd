use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;

/// 100-ns intervals between 1601-01-01 and the Unix epoch.
const EPOCH_DELTA_100NS: u64 = 116_444_736_000_000_000;

/// 9999-12-31T23:59:59Z. FILETIME values past this are treated as corrupt.
const MAX_UNIX_SECONDS: i64 = 253_402_300_799;

/// A Windows FILETIME (100-ns ticks since 1601-01-01 UTC) decoded once at
/// parse time. The in-memory form is always UTC; local-timezone rendering
/// happens only at serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WinTimestamp {
    pub raw: u64,
    #[serde(skip)]
    dt: Option<DateTime<Utc>>,
}

impl WinTimestamp {
    pub fn from_filetime(raw: u64) -> Self {
        if raw == 0 {
            return Self { raw, dt: None };
        }
        let since_epoch = raw.saturating_sub(EPOCH_DELTA_100NS);
        if raw < EPOCH_DELTA_100NS {
            // Pre-1970 values exist on real volumes; keep them.
            let back = EPOCH_DELTA_100NS - raw;
            let seconds = -((back / 10_000_000) as i64) - i64::from(back % 10_000_000 != 0);
            let nanos = ((10_000_000 - back % 10_000_000) % 10_000_000) * 100;
            let dt = Utc.timestamp_opt(seconds, nanos as u32).single();
            return Self { raw, dt };
        }
        let seconds = (since_epoch / 10_000_000) as i64;
        let nanos = ((since_epoch % 10_000_000) * 100) as u32;
        if seconds > MAX_UNIX_SECONDS {
            // Beyond year 9999: corrupt, render empty and flag in notes.
            return Self { raw, dt: None };
        }
        Self {
            raw,
            dt: Utc.timestamp_opt(seconds, nanos).single(),
        }
    }

    pub fn zero() -> Self {
        Self { raw: 0, dt: None }
    }

    /// FILETIME of 0 means the field was never set.
    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    /// Nonzero but undecodable (past year 9999).
    pub fn is_corrupt(&self) -> bool {
        self.raw != 0 && self.dt.is_none()
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        self.dt
    }

    /// Microsecond component, 0 when unset or corrupt.
    pub fn microseconds(&self) -> u32 {
        self.dt
            .map(|d| d.timestamp_subsec_micros())
            .unwrap_or(0)
    }

    /// Epoch seconds for body/timeline output; 0 for unset or corrupt.
    pub fn unix_seconds(&self) -> i64 {
        self.dt.map(|d| d.timestamp()).unwrap_or(0).max(0)
    }

    /// ISO-8601 with explicit offset; empty string for unset or corrupt
    /// values. With `local` set the UTC instant is converted at this point.
    pub fn to_iso8601(&self, local: bool) -> String {
        match self.dt {
            Some(dt) if local => dt.with_timezone(&Local).to_rfc3339(),
            Some(dt) => dt.to_rfc3339(),
            None => String::new(),
        }
    }

    /// Spreadsheet-friendly rendering for the excel CSV variant.
    pub fn to_datetime_string(&self) -> String {
        match self.dt {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => String::new(),
        }
    }

    /// `MM/DD/YYYY` and `HH:MM:SS` pair for the L2T columns.
    pub fn to_l2t_parts(&self) -> (String, String) {
        match self.dt {
            Some(dt) => (
                dt.format("%m/%d/%Y").to_string(),
                dt.format("%H:%M:%S").to_string(),
            ),
            None => (String::new(), String::new()),
        }
    }
}

impl Default for WinTimestamp {
    fn default() -> Self {
        Self::zero()
    }
}
