extern crate anyhow;
extern crate serde_json;

use anyhow::Context;
use crate::aggregate;
use crate::aggregate::AggregatedArrival;
use crate::config;
use crate::result;
use crate::stations;

/// One entry of the rail prediction feed. WMATA leaves several of these null
/// for trains without a real destination, hence the options.
#[derive(Clone, Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct RawArrival {
    #[serde(default)]
    pub location_code: Option<String>,
    #[serde(default)]
    pub destination_code: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub destination_name: Option<String>,
    #[serde(default)]
    pub line: Option<String>,
    #[serde(default)]
    pub min: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PredictionResponse {
    trains: Vec<RawArrival>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StationTrainView {
    pub station_code: String,
    pub station_name: Option<String>,
    pub arrivals: Vec<AggregatedArrival>,
}

pub type StationTrainViews = std::collections::BTreeMap<String, StationTrainView>;

pub fn parse_response(response_body: &str) -> result::MetroResult<Vec<RawArrival>> {
    let response: PredictionResponse = serde_json::from_str(response_body)
        .with_context(|| format!("while parsing train predictions: \"{}\"", result::snippet(response_body)))?;
    return Ok(response.trains);
}

/// Parses an integer prefix the way a lenient display would: leading
/// whitespace and sign allowed, trailing junk ignored.
pub fn leading_integer(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (sign, digits) = match trimmed.chars().next() {
        Some('-') => (-1, &trimmed[1..]),
        Some('+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    return digits[..end].parse::<i64>().ok().map(|n| sign * n);
}

pub fn meets_threshold(minutes: &str, hide_less_than: i64) -> bool {
    if hide_less_than == 0 {
        return true;
    }
    let parsed = match minutes {
        "BRD" | "ARR" => Some(0),
        other => leading_integer(other),
    };
    match parsed {
        Some(m) => return m >= hide_less_than,
        None => return true,
    }
}

fn is_displayable(train: &RawArrival) -> bool {
    let destination_code = train.destination_code.as_deref().unwrap_or("");
    let line = train.line.as_deref().unwrap_or("--");
    let min = train.min.as_deref().unwrap_or("");

    return !destination_code.is_empty()
        && train.destination_name.as_deref() != Some("Train")
        && line != "--"
        && !min.is_empty();
}

fn display_destination(config: &config::Config, station_table: &stations::StationTable, train: &RawArrival) -> String {
    let label = train.destination.as_ref()
        .or(train.destination_name.as_ref())
        .cloned()
        .unwrap_or_default();

    if !config.show_destination_full_name {
        return label;
    }

    return train.destination_code.as_deref()
        .and_then(|code| station_table.name_for(code))
        .map(|name| name.to_string())
        .unwrap_or(label);
}

pub fn empty_station_views(config: &config::Config, station_table: &stations::StationTable) -> StationTrainViews {
    let mut views = StationTrainViews::new();
    for code in &config.stations_to_show_list {
        let name = station_table.name_for(code).map(|n| n.to_string());
        if name.is_none() {
            warn!("No station name known for code {}", code);
        }
        views.insert(code.clone(), StationTrainView{
            station_code: code.clone(),
            station_name: name,
            arrivals: vec![],
        });
    }
    return views;
}

/// Filters raw predictions down to what should be shown and aggregates each
/// station's arrivals by destination. Every configured station gets an
/// entry, even without trains.
pub fn parse_train_times(
    config: &config::Config,
    station_table: &stations::StationTable,
    aliases: &aggregate::DestinationAliases,
    trains: &[RawArrival]) -> StationTrainViews {

    let mut views = empty_station_views(config, station_table);
    let mut pending: std::collections::BTreeMap<String, Vec<aggregate::AggregateRecord>> =
        std::collections::BTreeMap::new();

    for train in trains {
        if !is_displayable(train) {
            continue;
        }
        let destination_code = train.destination_code.as_deref().unwrap_or("");
        if config.destinations_to_exclude_list.iter().any(|d| d == destination_code) {
            continue;
        }
        let min = train.min.clone().unwrap_or_default();
        if !meets_threshold(&min, config.hide_train_times_less_than) {
            continue;
        }

        let location = train.location_code.clone().unwrap_or_default();
        if !views.contains_key(&location) {
            debug!("Dropping arrival for unconfigured station {:?}", location);
            continue;
        }

        pending.entry(location).or_insert_with(Vec::new).push(aggregate::AggregateRecord{
            group_key: display_destination(config, station_table, train),
            merge_value: train.line.clone().unwrap_or_default(),
            time_value: min,
        });
    }

    for (code, records) in pending {
        if let Some(view) = views.get_mut(&code) {
            view.arrivals = aggregate::aggregate(records, aliases).into_iter()
                .map(AggregatedArrival::from)
                .collect();
        }
    }

    return views;
}
