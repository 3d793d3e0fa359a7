use serde::{Deserialize, Deserializer};

use super::timestamp::FlexTimestamp;

/// Событие из внешнего каталога. Только чтение, никогда не персистится.
///
/// Каталог может отдавать `id` числом — для нас это непрозрачная строка.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEvent {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(rename = "showDateTimes", default)]
    pub show_date_times: Vec<FlexTimestamp>,
    #[serde(default)]
    pub location: Option<String>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_numeric_id_and_mixed_timestamps() {
        let event: CatalogEvent = serde_json::from_str(
            r#"{
                "id": 1,
                "name": "Concert",
                "showDateTimes": ["2025-12-25T19:00:00", "2025-12-26T19:00:00Z"],
                "location": "Almaty Arena"
            }"#,
        )
        .unwrap();
        assert_eq!(event.id, "1");
        assert_eq!(event.show_date_times.len(), 2);
        assert_eq!(event.location.as_deref(), Some("Almaty Arena"));
    }

    #[test]
    fn deserializes_string_id_without_location() {
        let event: CatalogEvent =
            serde_json::from_str(r#"{"id": "ev-9", "name": "Play", "showDateTimes": []}"#).unwrap();
        assert_eq!(event.id, "ev-9");
        assert!(event.location.is_none());
    }
}
