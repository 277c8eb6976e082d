use joule::messages::{Decision, Event};
use serde::{Deserialize, Serialize};

use crate::{EdcError, Result};

/// Wire encoding negotiated at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Json,
    Binary,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct EventBatch {
    pub now: f64,
    pub events: Vec<Event>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DecisionBatch {
    pub now: f64,
    pub decisions: Vec<Decision>,
}

/// Event tags this component understands; anything else in a JSON batch is
/// skipped for forward compatibility instead of failing the tick.
const KNOWN_EVENTS: [&str; 5] = [
    "Hello",
    "SimulationBegins",
    "JobSubmitted",
    "JobCompleted",
    "AllStaticJobsSubmitted",
];

fn event_tag(value: &serde_json::Value) -> Option<&str> {
    match value {
        serde_json::Value::String(tag) => Some(tag),
        serde_json::Value::Object(map) if map.len() == 1 => {
            map.keys().next().map(|k| k.as_str())
        }
        _ => None,
    }
}

pub fn decode_events(format: WireFormat, data: &[u8]) -> Result<EventBatch> {
    match format {
        WireFormat::Binary => Ok(bincode::deserialize(data)?),
        WireFormat::Json => {
            #[derive(Deserialize)]
            struct RawBatch {
                now: f64,
                events: Vec<serde_json::Value>,
            }
            let raw: RawBatch = serde_json::from_slice(data)?;
            let mut events = Vec::with_capacity(raw.events.len());
            for value in raw.events {
                match serde_json::from_value::<Event>(value.clone()) {
                    Ok(event) => events.push(event),
                    Err(e) => {
                        let known = event_tag(&value)
                            .map(|tag| KNOWN_EVENTS.contains(&tag))
                            .unwrap_or(false);
                        if known {
                            // a recognized event that does not parse is a
                            // protocol violation, not a future extension
                            return Err(EdcError::DeserializationError(format!(
                                "malformed event {}: {}",
                                value, e
                            )));
                        }
                        log::debug!("skipping unrecognized event {}", value);
                    }
                }
            }
            Ok(EventBatch {
                now: raw.now,
                events,
            })
        }
    }
}

pub fn encode_decisions(format: WireFormat, batch: &DecisionBatch) -> Result<Vec<u8>> {
    match format {
        WireFormat::Json => Ok(serde_json::to_vec(batch)?),
        WireFormat::Binary => Ok(bincode::serialize(batch)?),
    }
}

#[cfg(test)]
mod tests {
    use joule::messages::{Decision, Event};

    use super::{decode_events, encode_decisions, DecisionBatch, EventBatch, WireFormat};

    #[test]
    fn test_json_decode_event_batch() {
        let data = br#"{
            "now": 5.0,
            "events": [
                "Hello",
                {"SimulationBegins": {"nb_hosts": 16}},
                {"JobSubmitted": {"job_id": "w0!1", "width": 2, "walltime": 30.0}},
                {"JobCompleted": {"job_id": "w0!0"}}
            ]
        }"#;
        let batch = decode_events(WireFormat::Json, data).unwrap();
        assert_eq!(batch.now, 5.0);
        assert_eq!(batch.events.len(), 4);
        assert_eq!(batch.events[0], Event::Hello);
        assert_eq!(
            batch.events[2],
            Event::JobSubmitted {
                job_id: "w0!1".to_string(),
                width: 2,
                walltime: 30.0
            }
        );
    }

    #[test]
    fn test_json_skips_unknown_events() {
        let data = br#"{
            "now": 1.0,
            "events": [
                {"HostPowerStateChanged": {"host": 3, "state": "sleep"}},
                "SomeFlagEvent",
                {"JobCompleted": {"job_id": "a"}}
            ]
        }"#;
        let batch = decode_events(WireFormat::Json, data).unwrap();
        assert_eq!(
            batch.events,
            vec![Event::JobCompleted {
                job_id: "a".to_string()
            }]
        );
    }

    #[test]
    fn test_json_malformed_known_event_is_fatal() {
        let data = br#"{"now": 1.0, "events": [{"JobSubmitted": {"job_id": "a"}}]}"#;
        assert!(decode_events(WireFormat::Json, data).is_err());
        assert!(decode_events(WireFormat::Json, b"not a batch").is_err());
    }

    #[test]
    fn test_binary_batches_round_trip() {
        let events = EventBatch {
            now: 3.5,
            events: vec![
                Event::Hello,
                Event::JobSubmitted {
                    job_id: "j".to_string(),
                    width: 1,
                    walltime: 2.0,
                },
            ],
        };
        let encoded = bincode::serialize(&events).unwrap();
        assert_eq!(decode_events(WireFormat::Binary, &encoded).unwrap(), events);
        assert!(decode_events(WireFormat::Binary, b"\xff\xff").is_err());

        let decisions = DecisionBatch {
            now: 3.5,
            decisions: vec![Decision::ExecuteJob {
                job_id: "j".to_string(),
                hosts: "0-1".to_string(),
            }],
        };
        let encoded = encode_decisions(WireFormat::Binary, &decisions).unwrap();
        let decoded: DecisionBatch = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded, decisions);
    }

    #[test]
    fn test_json_decision_shape() {
        let batch = DecisionBatch {
            now: 7.0,
            decisions: vec![
                Decision::RejectJob {
                    job_id: "big".to_string(),
                },
                Decision::ExecuteJob {
                    job_id: "j".to_string(),
                    hosts: "0,2-4".to_string(),
                },
            ],
        };
        let encoded = encode_decisions(WireFormat::Json, &batch).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(value["now"], 7.0);
        assert_eq!(value["decisions"][0]["RejectJob"]["job_id"], "big");
        assert_eq!(value["decisions"][1]["ExecuteJob"]["hosts"], "0,2-4");
    }
}
