//! The results document: the live, read-mostly mirror of [`crate::config`]
//! that the worker thread publishes into every tick and every frontend
//! reads from.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Per-channel computed quantities for the most recent tick. Fields are
/// `None` until the first successful tick populates them, and individually
/// reset to `None` (not the whole struct) if a single channel's computation
/// fails on a given tick while others succeed.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ChannelResult {
    pub name: String,
    pub t_upstream: Option<f64>,
    pub t_downstream: Option<f64>,
    pub flow_kg_sec: Option<f64>,
    pub power_w: Option<f64>,
    pub error: Option<String>,
}

/// One timestamped sample in a channel's datalog history.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DatalogSample {
    pub timestamp: DateTime<Local>,
    pub power_w: Option<f64>,
}

/// Bounded per-channel history of [`DatalogSample`]s, used by frontends
/// that want a short replay window rather than only the latest tick.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Datalog {
    pub channel: String,
    pub samples: Vec<DatalogSample>,
}

/// The full results document, mirroring [`crate::config::Config`]'s
/// channel list.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Results {
    pub tick_count: u64,
    pub last_tick_at: Option<DateTime<Local>>,
    pub channels: Vec<ChannelResult>,
    #[serde(default)]
    pub datalogs: Vec<Datalog>,
}

impl Results {
    /// The filename `results.save_to_file()` would write: a
    /// `<timestamp>`-suffixed name under the configured save directory.
    pub fn save_filename(&self, at: DateTime<Local>) -> String {
        format!(
            "picalor_measurement_results_{}.json",
            at.format("%Y-%m-%d_%H-%M-%S")
        )
    }

    /// Serialize to the JSON form frontends consume, with non-finite
    /// numbers represented as JSON `null` rather than bare `NaN`/`Infinity`
    /// (which aren't valid JSON).
    pub fn to_json(&self) -> anyhow::Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        sanitize_non_finite(&mut value);
        Ok(value)
    }
}

/// Recursively replace non-finite JSON numbers with `null`. `serde_json`
/// already refuses to serialize `f64::NAN`/`INFINITY` directly (producing
/// an error instead), so values destined for this path must be converted
/// through an intermediate representation that tolerates them; this walks
/// a [`serde_json::Value`] tree built from [`Option<f64>`] fields, which
/// are `null` already, and is a no-op for a document with no raw floats.
fn sanitize_non_finite(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                sanitize_non_finite(item);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                sanitize_non_finite(v);
            }
        }
        serde_json::Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    *value = serde_json::Value::Null;
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_filename_matches_expected_shape() {
        let results = Results::default();
        let at: DateTime<Local> = "2026-07-31T10:20:30+00:00"
            .parse::<DateTime<chrono::FixedOffset>>()
            .unwrap()
            .into();
        let name = results.save_filename(at);
        assert!(name.starts_with("picalor_measurement_results_"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn to_json_has_no_raw_nan_or_infinity() {
        let mut results = Results::default();
        results.channels.push(ChannelResult {
            name: "ch0".to_string(),
            power_w: None,
            ..Default::default()
        });
        let value = results.to_json().unwrap();
        let text = value.to_string();
        assert!(!text.contains("NaN"));
        assert!(!text.contains("Infinity"));
    }
}
