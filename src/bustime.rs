extern crate anyhow;
extern crate indexmap;
extern crate serde;
extern crate serde_json;
extern crate serde_with;

use anyhow::Context;
use crate::aggregate;
use crate::aggregate::AggregatedArrival;
use crate::result;
use indexmap::IndexMap;
use serde_with::{DisplayFromStr, PickFirst, serde_as};

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawBusPrediction {
    #[serde(rename = "RouteID")]
    pub route_id: String,
    pub direction_text: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub minutes: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BusPredictionResponse {
    #[serde(default)]
    stop_name: Option<String>,
    predictions: Vec<RawBusPrediction>,
}

/// Aggregated predictions for one polled stop. `arrivals` rows carry the
/// route IDs in `line` and the direction text in `destination`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusStopUpdate {
    pub stop_id: String,
    pub stop_name: String,
    pub arrivals: Vec<AggregatedArrival>,
}

pub fn parse_bus_times(stop_id: &str, response_body: &str, aliases: &aggregate::DestinationAliases) -> result::MetroResult<BusStopUpdate> {
    let response: BusPredictionResponse = serde_json::from_str(response_body)
        .with_context(|| format!("while parsing bus predictions for stop {}: \"{}\"", stop_id, result::snippet(response_body)))?;

    let records = response.predictions.into_iter().map(|p| aggregate::AggregateRecord{
        group_key: p.direction_text,
        merge_value: p.route_id,
        time_value: p.minutes.to_string(),
    }).collect();

    return Ok(BusStopUpdate{
        stop_id: stop_id.to_string(),
        stop_name: response.stop_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(stop_id.to_string()),
        arrivals: aggregate::aggregate(records, aliases).into_iter()
            .map(AggregatedArrival::from)
            .collect(),
    });
}

fn truncated(arrivals: &[AggregatedArrival], max_rows: usize) -> &[AggregatedArrival] {
    if max_rows != 0 && max_rows < arrivals.len() {
        return &arrivals[..max_rows];
    }
    return arrivals;
}

/// Consolidates stops sharing a display name under one heading, in order of
/// first appearance. Each stop is cut to `max_rows` before merging, and the
/// merged list is cut again.
pub fn group_by_stop_name<'a, I>(updates: I, max_rows: usize) -> Vec<(String, Vec<AggregatedArrival>)>
where I: IntoIterator<Item = &'a BusStopUpdate> {
    let mut grouped: IndexMap<String, Vec<AggregatedArrival>> = IndexMap::new();
    for update in updates {
        grouped.entry(update.stop_name.clone())
            .or_default()
            .extend_from_slice(truncated(&update.arrivals, max_rows));
    }

    return grouped.into_iter().map(|(name, mut rows)| {
        let keep = truncated(&rows, max_rows).len();
        rows.truncate(keep);
        (name, rows)
    }).collect();
}

#[cfg(test)]
mod tests {
    use crate::aggregate::{AggregatedArrival, DestinationAliases};

    fn row(route: &str, direction: &str, minutes: &str) -> AggregatedArrival {
        return AggregatedArrival{
            line: route.to_string(),
            destination: direction.to_string(),
            minutes: minutes.to_string(),
        };
    }

    #[test]
    fn parse_json() {
        let raw_json = std::fs::read_to_string("testdata/bus.json")
            .expect("Error reading bus.json");

        let update = super::parse_bus_times("1001195", &raw_json, &DestinationAliases::default())
            .expect("parse_bus_times");

        assert_eq!("1001195", update.stop_id);
        assert_eq!("16th St + U St NW", update.stop_name);
        assert_eq!(vec![
            row("S2/S9", "North to Silver Spring Station", "3, 8, 14"),
            row("S2", "South to Federal Triangle", "5"),
        ], update.arrivals);
    }

    #[test]
    fn minutes_as_strings_and_missing_stop_name() {
        let raw_json = r#"{"Predictions": [
            {"RouteID": "70", "DirectionText": "North to Silver Spring", "Minutes": "4"},
            {"RouteID": "79", "DirectionText": "North to Silver Spring", "Minutes": 9}
        ]}"#;

        let update = super::parse_bus_times("1003043", raw_json, &DestinationAliases::default())
            .expect("parse_bus_times");

        assert_eq!("1003043", update.stop_name);
        assert_eq!(vec![row("70/79", "North to Silver Spring", "4, 9")], update.arrivals);
    }

    #[test]
    fn malformed_json() {
        assert!(super::parse_bus_times("1", "{\"Message\": \"Invalid\"}", &DestinationAliases::default()).is_err());
    }

    #[test]
    fn stops_with_same_name_share_heading() {
        let updates = vec![
            super::BusStopUpdate{
                stop_id: "1".to_string(),
                stop_name: "Georgia Ave + Upshur St".to_string(),
                arrivals: vec![row("70", "North", "2"), row("79", "North", "6")],
            },
            super::BusStopUpdate{
                stop_id: "2".to_string(),
                stop_name: "14th St + Colorado Ave".to_string(),
                arrivals: vec![row("52", "South", "4")],
            },
            super::BusStopUpdate{
                stop_id: "3".to_string(),
                stop_name: "Georgia Ave + Upshur St".to_string(),
                arrivals: vec![row("70", "South", "1")],
            },
        ];

        let grouped = super::group_by_stop_name(&updates, 0);
        assert_eq!(vec![
            ("Georgia Ave + Upshur St".to_string(),
             vec![row("70", "North", "2"), row("79", "North", "6"), row("70", "South", "1")]),
            ("14th St + Colorado Ave".to_string(), vec![row("52", "South", "4")]),
        ], grouped);

        let grouped = super::group_by_stop_name(&updates, 1);
        assert_eq!(vec![
            ("Georgia Ave + Upshur St".to_string(), vec![row("70", "North", "2")]),
            ("14th St + Colorado Ave".to_string(), vec![row("52", "South", "4")]),
        ], grouped);
    }
}
