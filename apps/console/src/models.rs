use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use time::OffsetDateTime;

/// A named collection of dated events that can be overlaid on a temporal chart.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub collection_id: Option<u64>,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub events: Vec<TimelineEvent>,
}

impl Timeline {
    pub fn active_events(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.events.iter().filter(|event| !event.archived)
    }
}

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimelineEvent {
    pub id: u64,
    pub timeline_id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// When false only the date part of `timestamp` is meaningful.
    #[serde(default)]
    pub time_matters: bool,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_timeline_with_events() {
        let payload = json!([{
            "id": 3,
            "name": "Releases",
            "icon": "star",
            "collection_id": null,
            "default": false,
            "archived": false,
            "events": [
                {
                    "id": 10,
                    "timeline_id": 3,
                    "name": "v1.0",
                    "timestamp": "2022-03-01T00:00:00Z",
                    "time_matters": false,
                    "timezone": "UTC",
                    "archived": false
                },
                {
                    "id": 11,
                    "timeline_id": 3,
                    "name": "v0.9 (pulled)",
                    "timestamp": "2022-02-14T12:30:00+01:00",
                    "time_matters": true,
                    "archived": true
                }
            ]
        }]);

        let timelines: Vec<Timeline> = serde_json::from_value(payload).unwrap();
        assert_eq!(timelines.len(), 1);
        let releases = &timelines[0];
        assert_eq!(releases.name, "Releases");
        assert_eq!(releases.collection_id, None);
        assert_eq!(releases.events.len(), 2);
        assert_eq!(releases.events[0].timestamp.year(), 2022);
        let active: Vec<_> = releases.active_events().map(|e| e.id).collect();
        assert_eq!(active, vec![10]);
    }
}
