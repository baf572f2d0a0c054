extern crate anyhow;
extern crate serde_json;

use anyhow::Context;
use crate::result;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StationInfo {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Name")]
    pub name: String,
}

/// Station code -> display name. Loaded once at startup and never modified.
#[derive(Debug, Default)]
pub struct StationTable {
    names: std::collections::HashMap<String, String>,
}

impl StationTable {
    pub fn from_list(list: Vec<StationInfo>) -> StationTable {
        let mut names = std::collections::HashMap::new();
        for info in list {
            // Transfer stations appear once per platform code; first entry wins.
            names.entry(info.code).or_insert(info.name);
        }
        return StationTable{ names: names };
    }

    pub fn from_json(raw_json: &str) -> result::MetroResult<StationTable> {
        let list: Vec<StationInfo> = serde_json::from_str(raw_json)
            .context("while parsing station list")?;
        return Ok(StationTable::from_list(list));
    }

    pub fn load<P: AsRef<std::path::Path>>(path: P) -> result::MetroResult<StationTable> {
        let debug_path = path.as_ref().to_string_lossy().to_string();
        let raw_json = std::fs::read_to_string(path)
            .with_context(|| format!("Opening station list from '{}'", debug_path))?;
        return StationTable::from_json(&raw_json);
    }

    /// Like `load`, but a missing or broken file only costs us station names.
    pub fn load_or_empty<P: AsRef<std::path::Path>>(path: P) -> StationTable {
        match StationTable::load(path) {
            Ok(table) => {
                info!("Loaded {} station names", table.len());
                return table;
            },
            Err(err) => {
                error!("Station names unavailable: {:#}", err);
                return StationTable::default();
            }
        }
    }

    pub fn name_for(&self, code: &str) -> Option<&str> {
        return self.names.get(code).map(String::as_str);
    }

    pub fn len(&self) -> usize {
        return self.names.len();
    }
}
