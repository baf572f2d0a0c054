extern crate anyhow;
extern crate chrono_tz;
extern crate indexmap;
extern crate serde;
extern crate serde_json;
extern crate serde_with;

use anyhow::Context;
use crate::result;
use indexmap::IndexSet;
use serde_with::{DisplayFromStr, PickFirst, serde_as};

const MIN_REFRESH_MS: u64 = 1000;

/// Widget options. Keys keep the camelCase names the board config uses, and
/// booleans/numbers may be given either as JSON values or as strings.
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    #[serde(rename = "wmata_api_key")]
    pub api_key: Option<String>,
    pub api_host: String,
    pub identifier: String,
    pub path: String,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub show_incidents: bool,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub show_station_train_times: bool,

    #[serde(deserialize_with = "stop_ids")]
    pub bus_stops_to_show_list: Vec<String>,
    pub stations_to_show_list: Vec<String>,
    pub destinations_to_exclude_list: Vec<String>,
    pub aggregate_destinations: Vec<Vec<String>>,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub refresh_rate_incidents: u64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub refresh_rate_station_train_times: u64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub max_train_times_per_station: usize,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub hide_train_times_less_than: i64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub show_destination_full_name: bool,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub show_header: bool,
    pub header_text: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub incident_codes_only: bool,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub colorize_lines: bool,
    pub time_zone: String,
}

impl Default for Config {
    fn default() -> Config {
        return Config{
            api_key: None,
            api_host: crate::wmata::DEFAULT_API_HOST.to_string(),
            identifier: "dcmetro".to_string(),
            path: ".".to_string(),
            show_incidents: true,
            show_station_train_times: true,
            bus_stops_to_show_list: vec![],
            stations_to_show_list: vec!["A01".to_string(), "C01".to_string()],
            destinations_to_exclude_list: vec![],
            aggregate_destinations: vec![],
            refresh_rate_incidents: 2 * 60 * 1000,
            refresh_rate_station_train_times: 30 * 1000,
            max_train_times_per_station: 0,
            hide_train_times_less_than: 0,
            show_destination_full_name: true,
            show_header: true,
            header_text: "DC Metro Train Times".to_string(),
            incident_codes_only: false,
            colorize_lines: false,
            time_zone: "America/New_York".to_string(),
        };
    }
}

impl Config {
    /// The credential, if one was actually supplied. Blank keys count as missing.
    pub fn api_key(&self) -> Option<&str> {
        return self.api_key.as_ref()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty());
    }

    pub fn station_codes_path(&self) -> std::path::PathBuf {
        return std::path::Path::new(&self.path)
            .join("stationcodes")
            .join("stationcodes.json");
    }

    pub fn incidents_interval(&self) -> std::time::Duration {
        return std::time::Duration::from_millis(
            std::cmp::max(MIN_REFRESH_MS, self.refresh_rate_incidents));
    }

    pub fn arrivals_interval(&self) -> std::time::Duration {
        return std::time::Duration::from_millis(
            std::cmp::max(MIN_REFRESH_MS, self.refresh_rate_station_train_times));
    }

    /// Whether the arrivals timer has anything to fetch at all.
    pub fn polls_arrivals(&self) -> bool {
        return (self.show_station_train_times && !self.stations_to_show_list.is_empty())
            || !self.bus_stops_to_show_list.is_empty();
    }

    pub fn tz(&self) -> chrono_tz::Tz {
        match self.time_zone.parse::<chrono_tz::Tz>() {
            Ok(tz) => return tz,
            Err(_) => {
                warn!("Unknown time zone '{}', using America/New_York", self.time_zone);
                return chrono_tz::America::New_York;
            }
        }
    }
}

// Each stop is polled and shown once, however often it is listed.
fn stop_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where D: serde::Deserializer<'de> {
    let values = <Vec<serde_json::Value> as serde::Deserialize>::deserialize(deserializer)?;
    let ids = values.into_iter().map(|v| match v {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(
            format!("invalid bus stop id: {}", other))),
    }).collect::<Result<IndexSet<String>, D::Error>>()?;
    return Ok(ids.into_iter().collect());
}

pub fn from_str(raw_json: &str) -> result::MetroResult<Config> {
    let config: Config = serde_json::from_str(raw_json)
        .context("while parsing config")?;
    return Ok(config);
}

pub fn load<P: AsRef<std::path::Path>>(path: P) -> result::MetroResult<Config> {
    let debug_path = path.as_ref().to_string_lossy().to_string();
    let raw_json = std::fs::read_to_string(path)
        .with_context(|| format!("Opening config from '{}'", debug_path))?;
    return from_str(&raw_json)
        .with_context(|| format!("in config file '{}'", debug_path));
}

#[cfg(test)]
mod tests {
    #[test]
    fn defaults() {
        let config = super::from_str("{}").expect("parse empty config");

        assert_eq!(None, config.api_key());
        assert_eq!(vec!["A01", "C01"], config.stations_to_show_list);
        assert!(config.show_incidents);
        assert!(config.show_destination_full_name);
        assert_eq!(0, config.max_train_times_per_station);
        assert_eq!(std::time::Duration::from_secs(120), config.incidents_interval());
        assert_eq!(std::time::Duration::from_secs(30), config.arrivals_interval());
        assert_eq!("https://api.wmata.com", config.api_host);
    }

    #[test]
    fn loose_booleans_and_numbers() {
        let config = super::from_str(r#"{
            "wmata_api_key": "abc123",
            "showDestinationFullName": "false",
            "showIncidents": "true",
            "hideTrainTimesLessThan": "3",
            "maxTrainTimesPerStation": 4,
            "refreshRateIncidents": "60000"
        }"#).expect("parse config");

        assert_eq!(Some("abc123"), config.api_key());
        assert!(!config.show_destination_full_name);
        assert!(config.show_incidents);
        assert_eq!(3, config.hide_train_times_less_than);
        assert_eq!(4, config.max_train_times_per_station);
        assert_eq!(std::time::Duration::from_secs(60), config.incidents_interval());
    }

    #[test]
    fn bus_stops_as_numbers_or_strings() {
        let config = super::from_str(
            r#"{"busStopsToShowList": [1001195, "1003043"]}"#).expect("parse config");

        assert_eq!(vec!["1001195", "1003043"], config.bus_stops_to_show_list);
        assert!(config.polls_arrivals());
    }

    #[test]
    fn repeated_stop_ids_listed_once() {
        let config = super::from_str(
            r#"{"busStopsToShowList": ["1003043", 1001195, "1001195", 1003043]}"#).expect("parse config");

        assert_eq!(vec!["1003043", "1001195"], config.bus_stops_to_show_list);
    }

    #[test]
    fn blank_api_key_is_missing() {
        let config = super::from_str(r#"{"wmata_api_key": "  "}"#).expect("parse config");
        assert_eq!(None, config.api_key());
    }

    #[test]
    fn refresh_rates_are_clamped() {
        let config = super::from_str(r#"{"refreshRateStationTrainTimes": 0}"#).expect("parse config");
        assert_eq!(std::time::Duration::from_secs(1), config.arrivals_interval());
    }

    #[test]
    fn rejects_garbage() {
        assert!(super::from_str(r#"{"showIncidents": "maybe"}"#).is_err());
        assert!(super::from_str(r#"{"busStopsToShowList": [true]}"#).is_err());
    }

    #[test]
    fn station_codes_path_is_under_path() {
        let config = super::from_str(r#"{"path": "/opt/widget"}"#).expect("parse config");
        assert_eq!(std::path::PathBuf::from("/opt/widget/stationcodes/stationcodes.json"),
                   config.station_codes_path());
    }
}
