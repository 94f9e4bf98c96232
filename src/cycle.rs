/// Model cycle selection and human-readable forecast hour labels.
///
/// The alerter always works from the most recent 00z or 12z HRRR cycle
/// that has had time to publish: before 13z the 00z run, afterwards the
/// 12z run.
///
/// # Clock injection
/// `ModelCycle::latest` takes `now` as a parameter rather than calling
/// `Utc::now()` internally, so cycle selection and labels are
/// deterministic in tests.

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Timelike, Utc};

use crate::model::{AlerterError, ForecastHour};

/// Label format for hour stamps, e.g. `08/03/2019 02:00 PM`.
pub const LABEL_FORMAT: &str = "%m/%d/%Y %I:%M %p";

/// One model initialization and the local offset its labels are shown in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelCycle {
    init: DateTime<Utc>,
    utc_offset: FixedOffset,
}

impl ModelCycle {
    /// The cycle to use at `now`: 12z when the UTC hour is past 12,
    /// otherwise 00z, on `now`'s UTC date.
    pub fn latest(now: DateTime<Utc>, utc_offset_hours: i32) -> Result<Self, AlerterError> {
        let init_hour = if now.hour() > 12 { 12 } else { 0 };
        let init = now
            .date_naive()
            .and_hms_opt(init_hour, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .ok_or_else(|| AlerterError::Configuration("invalid cycle time".to_string()))?;

        Self::new(init, utc_offset_hours)
    }

    /// A cycle with an explicit initialization time.
    pub fn new(init: DateTime<Utc>, utc_offset_hours: i32) -> Result<Self, AlerterError> {
        let utc_offset = FixedOffset::east_opt(utc_offset_hours * 3600).ok_or_else(|| {
            AlerterError::Configuration(format!("invalid UTC offset: {} hours", utc_offset_hours))
        })?;
        Ok(Self { init, utc_offset })
    }

    pub fn init(&self) -> DateTime<Utc> {
        self.init
    }

    /// Initialization hour in UTC (0 or 12 for cycles chosen by `latest`).
    pub fn init_hour(&self) -> u32 {
        self.init.hour()
    }

    /// Initialization date as `YYYYMMDD`, used in provider directory names.
    pub fn date_stamp(&self) -> String {
        self.init.format("%Y%m%d").to_string()
    }

    /// Local valid time of `hour` after initialization.
    pub fn valid_time(&self, hour: ForecastHour) -> DateTime<FixedOffset> {
        (self.init + Duration::hours(i64::from(hour))).with_timezone(&self.utc_offset)
    }

    /// Human-readable local time label for `hour`.
    pub fn label(&self, hour: ForecastHour) -> String {
        self.valid_time(hour).format(LABEL_FORMAT).to_string()
    }

    /// Label of the initialization time itself.
    pub fn init_label(&self) -> String {
        self.label(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_morning_uses_00z_cycle() {
        let cycle = ModelCycle::latest(at(2019, 8, 3, 9, 41), 0).unwrap();
        assert_eq!(cycle.init(), at(2019, 8, 3, 0, 0));
        assert_eq!(cycle.init_hour(), 0);
    }

    #[test]
    fn test_hour_twelve_still_uses_00z_cycle() {
        // Strictly past 12 is required before switching to the 12z run.
        let cycle = ModelCycle::latest(at(2019, 8, 3, 12, 59), 0).unwrap();
        assert_eq!(cycle.init_hour(), 0);
    }

    #[test]
    fn test_afternoon_uses_12z_cycle() {
        let cycle = ModelCycle::latest(at(2019, 8, 3, 13, 5), 0).unwrap();
        assert_eq!(cycle.init(), at(2019, 8, 3, 12, 0));
        assert_eq!(cycle.date_stamp(), "20190803");
    }

    #[test]
    fn test_label_applies_offset_and_hour() {
        let cycle = ModelCycle::new(at(2019, 8, 3, 12, 0), -5).unwrap();
        // 12z + 2h = 14z = 09:00 AM CDT
        assert_eq!(cycle.label(2), "08/03/2019 09:00 AM");
        assert_eq!(cycle.init_label(), "08/03/2019 07:00 AM");
    }

    #[test]
    fn test_label_crosses_midnight() {
        let cycle = ModelCycle::new(at(2019, 8, 3, 12, 0), -5).unwrap();
        // 12z + 36h = 00z on the 5th = 07:00 PM on the 4th locally
        assert_eq!(cycle.label(36), "08/04/2019 07:00 PM");
    }

    #[test]
    fn test_invalid_offset_rejected() {
        let result = ModelCycle::new(at(2019, 8, 3, 0, 0), 48);
        assert!(matches!(result, Err(AlerterError::Configuration(_))));
    }
}
