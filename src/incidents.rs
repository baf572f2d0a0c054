extern crate anyhow;
extern crate indexmap;
extern crate serde_json;

use anyhow::Context;
use crate::result;
use indexmap::IndexSet;

/// Line codes in the order they are scanned for.
pub const LINE_CODES: [&str; 6] = ["BL", "GR", "OR", "RD", "SV", "YL"];

const LINE_NAMES: [&str; 6] = ["BLUE", "GREEN", "ORANGE", "RED", "SILVER", "YELLOW"];

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct RawIncident {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub lines_affected: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IncidentResponse {
    incidents: Vec<RawIncident>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IncidentSummary {
    pub descriptions: Vec<String>,
    pub affected_lines: Vec<String>,
}

pub fn parse_response(response_body: &str) -> result::MetroResult<Vec<RawIncident>> {
    let response: IncidentResponse = serde_json::from_str(response_body)
        .with_context(|| format!("while parsing incidents: \"{}\"", result::snippet(response_body)))?;
    return Ok(response.incidents);
}

pub fn line_name(code: &str) -> Option<&'static str> {
    match code {
        "BL" => Some("Blue"),
        "GR" => Some("Green"),
        "OR" => Some("Orange"),
        "RD" => Some("Red"),
        "SV" => Some("Silver"),
        "YL" => Some("Yellow"),
        _ => None,
    }
}

// WMATA sends "RD; OR;" here, but free text mentioning a color by name counts too.
fn mentions_line(lines_affected: &str, words: &[&str], index: usize) -> bool {
    return lines_affected.contains(LINE_CODES[index])
        || words.iter().any(|w| *w == LINE_NAMES[index]);
}

fn collect_lines(lines_affected: &str, lines: &mut IndexSet<String>) {
    let upper = lines_affected.to_uppercase();
    let words: Vec<&str> = upper
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    for (index, code) in LINE_CODES.iter().enumerate() {
        if mentions_line(&upper, &words, index) {
            lines.insert(code.to_string());
        }
    }
}

/// Collects every description and the distinct affected line codes. Codes
/// are appended per incident in `LINE_CODES` order.
pub fn parse_incidents(incidents: &[RawIncident]) -> IncidentSummary {
    let mut summary = IncidentSummary::default();
    let mut lines = IndexSet::new();
    for incident in incidents {
        summary.descriptions.push(incident.description.clone().unwrap_or_default());
        if let Some(ref lines_affected) = incident.lines_affected {
            collect_lines(lines_affected, &mut lines);
        }
    }
    summary.affected_lines = lines.into_iter().collect();
    return summary;
}
