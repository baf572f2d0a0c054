extern crate anyhow;
extern crate reqwest;

use anyhow::Context;
use crate::result;

pub const DEFAULT_API_HOST: &str = "https://api.wmata.com";

/// (url, api key) -> response body. Swapped out in tests.
pub type FetchFn = fn(&str, &str) -> result::MetroResult<String>;

pub fn incidents_url(api_host: &str) -> String {
    return format!("{}/Incidents.svc/json/Incidents", api_host.trim_end_matches('/'));
}

pub fn predictions_url(api_host: &str, station_codes: &[String]) -> String {
    return format!("{}/StationPrediction.svc/json/GetPrediction/{}",
                   api_host.trim_end_matches('/'), station_codes.join(","));
}

pub fn bus_predictions_url(api_host: &str, stop_id: &str) -> String {
    return format!("{}/NextBusService.svc/json/jPredictions?StopID={}",
                   api_host.trim_end_matches('/'), stop_id);
}

pub fn real_fetch(url: &str, api_key: &str) -> result::MetroResult<String> {
    use std::io::Read;

    let client = reqwest::blocking::Client::new();
    let mut response = client.get(url)
        .header("api_key", api_key)
        .header(reqwest::header::USER_AGENT, concat!("dcmetro/", env!("CARGO_PKG_VERSION")))
        .send()
        .with_context(|| format!("while fetching url: {}", url))?
        .error_for_status()
        .with_context(|| format!("bad status from url: {}", url))?;
    let mut response_body = String::new();
    response.read_to_string(&mut response_body)?;
    return Ok(response_body);
}
