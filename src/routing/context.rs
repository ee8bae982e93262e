//! Per-request visit attributes used by the routing engine.
//!
//! A `VisitContext` is built once per redirect request from the raw HTTP
//! metadata (see the `enrichment` module) and is read-only from then on.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Coarse device classification derived from the User-Agent header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    #[default]
    Desktop,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
        }
    }
}

/// Everything the routing engine may match a rule condition against.
///
/// Geo fields come from GeoIP lookup, device/os/browser from User-Agent
/// classification, UTM fields from query parameters. Absent attributes stay
/// `None` and are handled by the condition evaluator's absence semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitContext {
    /// ISO country code, e.g. "US"
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub device_type: DeviceType,
    pub os: Option<String>,
    pub browser: Option<String>,
    /// Primary language tag from Accept-Language, e.g. "en-US"
    pub language: Option<String>,
    pub referer: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// 0 = Sunday .. 6 = Saturday, derived from `timestamp`
    pub day_of_week: u8,
    /// Minutes since midnight (0..=1439), derived from `timestamp`
    pub time_of_day: u16,
}

impl Default for VisitContext {
    fn default() -> Self {
        Self::at(DateTime::UNIX_EPOCH)
    }
}

impl VisitContext {
    /// Create an empty context for the given instant, with the derived
    /// time fields filled in.
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            country: None,
            region: None,
            city: None,
            device_type: DeviceType::default(),
            os: None,
            browser: None,
            language: None,
            referer: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            utm_term: None,
            utm_content: None,
            timestamp,
            day_of_week: timestamp.weekday().num_days_from_sunday() as u8,
            time_of_day: (timestamp.hour() * 60 + timestamp.minute()) as u16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_derived_time_fields() {
        // 2024-03-06 was a Wednesday
        let ts = Utc.with_ymd_and_hms(2024, 3, 6, 14, 30, 12).unwrap();
        let ctx = VisitContext::at(ts);
        assert_eq!(ctx.day_of_week, 3);
        assert_eq!(ctx.time_of_day, 14 * 60 + 30);
    }

    #[test]
    fn test_sunday_is_zero() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 59).unwrap();
        let ctx = VisitContext::at(ts);
        assert_eq!(ctx.day_of_week, 0);
        assert_eq!(ctx.time_of_day, 0);
    }

    #[test]
    fn test_last_minute_of_day() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 3, 23, 59, 0).unwrap();
        assert_eq!(VisitContext::at(ts).time_of_day, 1439);
    }

    #[test]
    fn test_context_serde_round_trip() {
        let mut ctx = VisitContext::at(Utc.with_ymd_and_hms(2024, 3, 6, 9, 15, 0).unwrap());
        ctx.country = Some("US".to_string());
        ctx.device_type = DeviceType::Tablet;

        let json = serde_json::to_string(&ctx).unwrap();
        let restored: VisitContext = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.timestamp, ctx.timestamp);
        assert_eq!(restored.country.as_deref(), Some("US"));
        assert_eq!(restored.device_type, DeviceType::Tablet);
        assert_eq!(restored.time_of_day, ctx.time_of_day);
    }
}
