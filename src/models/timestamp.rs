//! timestamp.rs
//!
//! Гибкий парсинг временных меток.
//!
//! Внешний каталог событий отдаёт `showDateTimes` в локальном формате без
//! смещения, клиенты присылают RFC3339 с `Z` или числовым смещением.
//! Все варианты сводятся к абсолютному моменту в UTC.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Временная метка, принимающая несколько входных форматов.
///
/// Порядок попыток разбора:
/// 1. RFC3339 (`Z`, числовое смещение, с долями секунды и без);
/// 2. `YYYY-MM-DDTHH:MM:SS[.fff]` без смещения — трактуется как UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlexTimestamp(pub DateTime<Utc>);

impl FlexTimestamp {
    pub fn parse(input: &str) -> Option<Self> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Some(FlexTimestamp(dt.with_timezone(&Utc)));
        }
        // Без смещения: локальное время каталога считаем UTC.
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(FlexTimestamp(naive.and_utc()));
        }
        None
    }

    pub fn into_utc(self) -> DateTime<Utc> {
        self.0
    }
}

/// Отсутствующее поле запроса десериализуется в нулевой момент; шаг
/// валидации координатора отбрасывает его как незаполненное.
impl Default for FlexTimestamp {
    fn default() -> Self {
        FlexTimestamp(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl fmt::Display for FlexTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl Serialize for FlexTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl<'de> Deserialize<'de> for FlexTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FlexTimestamp::parse(&raw)
            .ok_or_else(|| de::Error::custom(format!("unrecognized timestamp format: {raw}")))
    }
}

/// Сравнение моментов с точностью до секунды.
///
/// Доли секунды отбрасываются: каталог и клиенты присылают одно и то же
/// время показа с разной точностью.
pub fn same_second(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.timestamp() == b.timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339_with_z() {
        let ts = FlexTimestamp::parse("2025-12-25T19:00:00Z").unwrap();
        assert_eq!(ts.0, Utc.with_ymd_and_hms(2025, 12, 25, 19, 0, 0).unwrap());
    }

    #[test]
    fn parses_rfc3339_with_numeric_offset() {
        let ts = FlexTimestamp::parse("2025-12-25T19:00:00+07:00").unwrap();
        assert_eq!(ts.0, Utc.with_ymd_and_hms(2025, 12, 25, 12, 0, 0).unwrap());
    }

    #[test]
    fn parses_naive_as_utc() {
        let ts = FlexTimestamp::parse("2025-07-15T19:00:00").unwrap();
        assert_eq!(ts.0, Utc.with_ymd_and_hms(2025, 7, 15, 19, 0, 0).unwrap());
    }

    #[test]
    fn parses_fractional_seconds() {
        let with_offset = FlexTimestamp::parse("2025-07-15T19:00:00.123Z").unwrap();
        let naive = FlexTimestamp::parse("2025-07-15T19:00:00.123").unwrap();
        assert_eq!(with_offset.0.timestamp(), naive.0.timestamp());
    }

    #[test]
    fn rejects_garbage() {
        assert!(FlexTimestamp::parse("25 декабря").is_none());
        assert!(FlexTimestamp::parse("2025-12-25").is_none());
    }

    #[test]
    fn naive_and_zoned_compare_equal_at_second_precision() {
        let a = FlexTimestamp::parse("2025-07-15T19:00:00").unwrap();
        let b = FlexTimestamp::parse("2025-07-15T19:00:00Z").unwrap();
        assert!(same_second(a.0, b.0));
    }

    #[test]
    fn serializes_as_rfc3339_utc() {
        let ts = FlexTimestamp::parse("2025-12-25T19:00:00+02:00").unwrap();
        assert_eq!(ts.to_string(), "2025-12-25T17:00:00Z");
    }
}
