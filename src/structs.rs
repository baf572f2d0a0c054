extern crate chrono;

use crate::bustime;
use crate::incidents;
use crate::trains;

pub const MISSING_API_KEY: &str = "Error: Missing API Key";
pub const TOO_MANY_ERRORS: &str = "Error: Too Many REST Failures";

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Incidents(incidents::IncidentSummary),
    StationTrainTimes(trains::StationTrainViews),
    BusTimes(bustime::BusStopUpdate),
    TooManyErrors,
    ResolvedErrors,
}

/// What the poller sends to the display side.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub identifier: String,
    pub time: chrono::DateTime<chrono::Utc>,
    pub payload: Payload,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainData {
    pub time: chrono::DateTime<chrono::Utc>,
    pub stations: trains::StationTrainViews,
}

/// Latest data per category, as last reported by the poller.
#[derive(Clone, Debug)]
pub struct DisplayState {
    identifier: String,
    pub error_message: Option<String>,
    pub incidents: Option<incidents::IncidentSummary>,
    pub trains: Option<TrainData>,
    pub buses: std::collections::HashMap<String, bustime::BusStopUpdate>,
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

impl DisplayState {
    pub fn new(identifier: &str) -> DisplayState {
        return DisplayState{
            identifier: identifier.to_string(),
            error_message: None,
            incidents: None,
            trains: None,
            buses: std::collections::HashMap::new(),
            last_updated: None,
        };
    }

    pub fn set_error(&mut self, message: &str) {
        self.error_message = Some(message.to_string());
    }

    /// Folds a notification into the state. Returns false for notifications
    /// addressed to some other widget instance.
    pub fn apply(&mut self, notification: Notification) -> bool {
        if notification.identifier != self.identifier {
            debug!("Ignoring notification for '{}'", notification.identifier);
            return false;
        }

        match notification.payload {
            Payload::Incidents(summary) => {
                self.incidents = Some(summary);
                self.last_updated = Some(notification.time);
            },
            Payload::StationTrainTimes(stations) => {
                self.trains = Some(TrainData{
                    time: notification.time,
                    stations: stations,
                });
                self.last_updated = Some(notification.time);
            },
            Payload::BusTimes(update) => {
                self.buses.insert(update.stop_id.clone(), update);
                self.last_updated = Some(notification.time);
            },
            Payload::TooManyErrors => {
                self.error_message = Some(TOO_MANY_ERRORS.to_string());
                self.last_updated = None;
            },
            Payload::ResolvedErrors => {
                self.error_message = None;
                self.last_updated = None;
            },
        }
        return true;
    }
}
