extern crate indexmap;

use indexmap::{IndexMap, IndexSet};

/// One row in the shape the aggregator works on. Rail rows project
/// (line, destination, minutes) into it, bus rows (route, direction, minutes).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregateRecord {
    pub group_key: String,
    pub merge_value: String,
    pub time_value: String,
}

/// A display row after aggregation: `line` may be several "/"-joined line
/// codes or route IDs, `minutes` a ", "-joined list of predictions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatedArrival {
    pub line: String,
    pub destination: String,
    pub minutes: String,
}

impl From<AggregateRecord> for AggregatedArrival {
    fn from(record: AggregateRecord) -> AggregatedArrival {
        return AggregatedArrival{
            line: record.merge_value,
            destination: record.group_key,
            minutes: record.time_value,
        };
    }
}

/// Maps every member of a configured alias group to the group's first entry.
#[derive(Clone, Debug, Default)]
pub struct DestinationAliases {
    canonical: std::collections::HashMap<String, String>,
}

impl DestinationAliases {
    pub fn from_groups(groups: &[Vec<String>]) -> DestinationAliases {
        let mut canonical = std::collections::HashMap::new();
        for group in groups {
            let head = match group.first() {
                Some(head) => head,
                None => continue,
            };
            for member in group {
                canonical.insert(member.clone(), head.clone());
            }
        }
        return DestinationAliases{ canonical: canonical };
    }

    pub fn resolve<'a>(&'a self, key: &'a str) -> &'a str {
        return self.canonical.get(key).map(String::as_str).unwrap_or(key);
    }
}

/// Collapses records sharing a resolved group key into one record per key,
/// in first-seen order. Times are kept in encounter order and joined with
/// ", "; distinct merge values are joined with "/".
pub fn aggregate(records: Vec<AggregateRecord>, aliases: &DestinationAliases) -> Vec<AggregateRecord> {
    let mut groups: IndexMap<String, (IndexSet<String>, Vec<String>)> = IndexMap::new();

    for record in records {
        let key = aliases.resolve(&record.group_key).to_string();
        let (merge_values, times) = groups.entry(key).or_default();
        merge_values.insert(record.merge_value);
        times.push(record.time_value);
    }

    return groups.into_iter().map(|(key, (merge_values, times))| AggregateRecord{
        group_key: key,
        merge_value: merge_values.into_iter().collect::<Vec<String>>().join("/"),
        time_value: times.join(", "),
    }).collect();
}
