use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A weekly time slot: day of week (1 = Monday .. 5 = Friday) plus a
/// half-open `[start, end)` range in minutes since midnight.
///
/// Start/end ordering is deliberately not enforced; a zero-length slot is
/// storable and never overlaps anything under the strict-inequality rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub day_of_week: i64,
    pub start_min: u32,
    pub end_min: u32,
}

// Wire shape: { "dayOfWeek": 1, "startTime": "09:00", "endTime": "10:30" }.
impl Serialize for TimeInterval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("TimeInterval", 3)?;
        st.serialize_field("dayOfWeek", &self.day_of_week)?;
        st.serialize_field("startTime", &format_hhmm(self.start_min))?;
        st.serialize_field("endTime", &format_hhmm(self.end_min))?;
        st.end()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeIntervalWire {
    day_of_week: i64,
    start_time: String,
    end_time: String,
}

impl<'de> Deserialize<'de> for TimeInterval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = TimeIntervalWire::deserialize(deserializer)?;
        if !(1..=5).contains(&wire.day_of_week) {
            return Err(D::Error::custom("dayOfWeek must be between 1 and 5"));
        }
        let start_min = parse_hhmm(&wire.start_time)
            .ok_or_else(|| D::Error::custom("startTime must be HH:MM"))?;
        let end_min = parse_hhmm(&wire.end_time)
            .ok_or_else(|| D::Error::custom("endTime must be HH:MM"))?;
        Ok(TimeInterval {
            day_of_week: wire.day_of_week,
            start_min,
            end_min,
        })
    }
}

impl TimeInterval {
    pub fn duration_min(&self) -> i64 {
        self.end_min as i64 - self.start_min as i64
    }

    /// Half-open overlap on the same day. Touching boundaries (one slot
    /// ending exactly when another starts) do not overlap.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.day_of_week == other.day_of_week
            && self.start_min < other.end_min
            && other.start_min < self.end_min
    }
}

/// Parse `HH:MM` into minutes since midnight. Hours are not clamped to 23:
/// a previously shifted slot may legitimately read e.g. `24:30`.
pub fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':')?;
    if h.is_empty() || m.len() != 2 {
        return None;
    }
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if m >= 60 {
        return None;
    }
    Some(h * 60 + m)
}

pub fn format_hhmm(total_min: u32) -> String {
    format!("{:02}:{:02}", total_min / 60, total_min % 60)
}

/// Minute arithmetic for duration-preserving moves. No 24-hour wraparound:
/// shifting past midnight produces hour values past 23. The other direction
/// floors at zero: times are unsigned minutes, so a shift that would land
/// before midnight returns `00:00` instead of going negative, and a
/// negative-duration slot moved far enough back collapses rather than
/// keeping its span.
pub fn add_minutes(start_min: u32, delta_min: i64) -> u32 {
    let shifted = start_min as i64 + delta_min;
    shifted.max(0) as u32
}
