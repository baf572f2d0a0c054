extern crate chrono;

use crate::aggregate;
use crate::backoff;
use crate::bustime;
use crate::config;
use crate::incidents;
use crate::result;
use crate::stations;
use crate::structs;
use crate::trains;
use crate::wmata;

use std::sync::mpsc;
use std::time::{Duration, Instant};

// Keeps the first arrivals request from colliding with the first incidents request.
const INITIAL_ARRIVALS_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Incidents,
    Trains,
    Bus(String),
}

pub struct Completion {
    pub request: Request,
    pub body: result::MetroResult<String>,
}

/// Owns the polling timers and the backoff state. Requests run on their own
/// threads and report back over `completions`; everything else happens on
/// the thread that drives the poller.
pub struct Poller {
    config: config::Config,
    api_key: String,
    station_table: stations::StationTable,
    aliases: aggregate::DestinationAliases,
    controller: backoff::PollController,
    fetch_fn: wmata::FetchFn,
    notifications: mpsc::Sender<structs::Notification>,
    completions_tx: mpsc::Sender<Completion>,
    completions_rx: mpsc::Receiver<Completion>,
    in_flight: usize,
}

impl Poller {
    pub fn new(
        config: config::Config,
        station_table: stations::StationTable,
        fetch_fn: wmata::FetchFn,
        notifications: mpsc::Sender<structs::Notification>) -> result::MetroResult<Poller> {

        let api_key = config.api_key()
            .ok_or(result::make_error(structs::MISSING_API_KEY))?
            .to_string();
        let aliases = aggregate::DestinationAliases::from_groups(&config.aggregate_destinations);
        let (completions_tx, completions_rx) = mpsc::channel();

        return Ok(Poller{
            config: config,
            api_key: api_key,
            station_table: station_table,
            aliases: aliases,
            controller: backoff::PollController::new(),
            fetch_fn: fetch_fn,
            notifications: notifications,
            completions_tx: completions_tx,
            completions_rx: completions_rx,
            in_flight: 0,
        });
    }

    pub fn controller(&self) -> &backoff::PollController {
        return &self.controller;
    }

    pub fn in_flight(&self) -> usize {
        return self.in_flight;
    }

    fn url_for(&self, request: &Request) -> String {
        match request {
            Request::Incidents => wmata::incidents_url(&self.config.api_host),
            Request::Trains => wmata::predictions_url(
                &self.config.api_host, &self.config.stations_to_show_list),
            Request::Bus(stop_id) => wmata::bus_predictions_url(&self.config.api_host, stop_id),
        }
    }

    fn issue(&mut self, request: Request) {
        let url = self.url_for(&request);
        let fetch_fn = self.fetch_fn;
        let api_key = self.api_key.clone();
        let completions = self.completions_tx.clone();

        debug!("Fetching {}", url);
        let spawned = std::thread::Builder::new()
            .name("fetch".to_string())
            .spawn(move || {
                let body = fetch_fn(&url, &api_key);
                let _ = completions.send(Completion{ request: request, body: body });
            });

        match spawned {
            Ok(_) => self.in_flight += 1,
            Err(err) => {
                error!("Couldn't start request thread: {}", err);
                self.record_failure(Instant::now());
            }
        }
    }

    /// Returns the number of requests issued; zero while suspended.
    pub fn poll_incidents(&mut self) -> usize {
        if self.controller.is_suspended() {
            debug!("Suspended, skipping incidents");
            return 0;
        }
        self.issue(Request::Incidents);
        return 1;
    }

    /// One rail request for all stations plus one request per bus stop.
    pub fn poll_arrivals(&mut self) -> usize {
        if self.controller.is_suspended() {
            debug!("Suspended, skipping arrivals");
            return 0;
        }
        let mut issued = 0;
        if self.config.show_station_train_times && !self.config.stations_to_show_list.is_empty() {
            self.issue(Request::Trains);
            issued += 1;
        }
        for stop_id in self.config.bus_stops_to_show_list.clone() {
            self.issue(Request::Bus(stop_id));
            issued += 1;
        }
        return issued;
    }

    fn process(&self, request: &Request, body: &str) -> result::MetroResult<structs::Payload> {
        match request {
            Request::Incidents => {
                let raw = incidents::parse_response(body)?;
                return Ok(structs::Payload::Incidents(incidents::parse_incidents(&raw)));
            },
            Request::Trains => {
                let raw = trains::parse_response(body)?;
                return Ok(structs::Payload::StationTrainTimes(trains::parse_train_times(
                    &self.config, &self.station_table, &self.aliases, &raw)));
            },
            Request::Bus(stop_id) => {
                return Ok(structs::Payload::BusTimes(
                    bustime::parse_bus_times(stop_id, body, &self.aliases)?));
            },
        }
    }

    fn notify(&self, payload: structs::Payload) {
        let notification = structs::Notification{
            identifier: self.config.identifier.clone(),
            time: chrono::Utc::now(),
            payload: payload,
        };
        if self.notifications.send(notification).is_err() {
            warn!("Display is gone, dropping notification");
        }
    }

    fn record_failure(&mut self, now: Instant) {
        if let Some(backoff::Transition::Suspended) = self.controller.record_failure(now) {
            error!("{} failed requests, pausing updates for {}s",
                   self.controller.error_count(), backoff::COOLDOWN.as_secs());
            self.notify(structs::Payload::TooManyErrors);
        }
    }

    pub fn handle_completion(&mut self, completion: Completion, now: Instant) {
        self.in_flight = self.in_flight.saturating_sub(1);

        let Completion { request, body } = completion;
        let processed = body.and_then(|body| self.process(&request, &body));
        match processed {
            Ok(payload) => {
                debug!("Got update for {:?}", request);
                self.notify(payload);
            },
            Err(err) => {
                warn!("Request {:?} failed: {:#}", request, err);
                self.record_failure(now);
            },
        }
    }

    pub fn check_resume(&mut self, now: Instant) {
        if let Some(backoff::Transition::Resumed) = self.controller.check_resume(now) {
            info!("Cooldown over, resuming updates");
            self.notify(structs::Payload::ResolvedErrors);
        }
    }

    /// Waits up to `timeout` for one request to finish and handles it.
    pub fn wait_for_completion(&mut self, timeout: Duration) -> bool {
        match self.completions_rx.recv_timeout(timeout) {
            Ok(completion) => {
                self.handle_completion(completion, Instant::now());
                return true;
            },
            Err(_) => return false,
        }
    }

    /// Polls every enabled endpoint once and waits for the answers.
    pub fn run_once(&mut self, timeout: Duration) {
        let start = Instant::now();
        self.check_resume(start);
        if self.config.show_incidents {
            self.poll_incidents();
        }
        self.poll_arrivals();

        while self.in_flight > 0 {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                warn!("Gave up waiting on {} requests", self.in_flight);
                return;
            }
            self.wait_for_completion(timeout - elapsed);
        }
    }

    /// Fires whatever is due at `now` and returns when it next needs to run.
    /// Ticks that come due while suspended are skipped but still advance.
    pub fn tick(&mut self, now: Instant, schedule: &mut Schedule) -> Option<Instant> {
        self.check_resume(now);

        if let Some(due) = schedule.next_incidents {
            if now >= due {
                self.poll_incidents();
                schedule.next_incidents = Some(next_tick(due, schedule.incidents_interval, now));
            }
        }
        if let Some(due) = schedule.next_arrivals {
            if now >= due {
                self.poll_arrivals();
                schedule.next_arrivals = Some(next_tick(due, schedule.arrivals_interval, now));
            }
        }

        return [schedule.next_incidents, schedule.next_arrivals, self.controller.resume_deadline()]
            .iter()
            .filter_map(|d| *d)
            .min();
    }

    pub fn run(mut self) {
        let mut schedule = Schedule::new(&self.config, Instant::now());
        if schedule.is_idle() {
            warn!("Nothing configured to poll");
            return;
        }

        info!("Polling incidents every {:?}, arrivals every {:?}",
              schedule.incidents_interval, schedule.arrivals_interval);

        while let Some(deadline) = self.tick(Instant::now(), &mut schedule) {
            self.wait_for_completion(deadline.saturating_duration_since(Instant::now()));
        }
    }
}

/// When each timer fires next. A timer that has nothing to fetch stays `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schedule {
    incidents_interval: Duration,
    arrivals_interval: Duration,
    next_incidents: Option<Instant>,
    next_arrivals: Option<Instant>,
}

impl Schedule {
    pub fn new(config: &config::Config, start: Instant) -> Schedule {
        return Schedule{
            incidents_interval: config.incidents_interval(),
            arrivals_interval: config.arrivals_interval(),
            next_incidents: if config.show_incidents { Some(start) } else { None },
            next_arrivals: if config.polls_arrivals() {
                Some(start + INITIAL_ARRIVALS_DELAY)
            } else {
                None
            },
        };
    }

    pub fn is_idle(&self) -> bool {
        return self.next_incidents.is_none() && self.next_arrivals.is_none();
    }
}

fn next_tick(due: Instant, interval: Duration, now: Instant) -> Instant {
    let next = due + interval;
    if next <= now {
        // We fell behind; don't fire a burst of catch-up ticks.
        return now + interval;
    }
    return next;
}

#[cfg(test)]
mod tests {
    use super::{Completion, Poller, Request, Schedule};
    use crate::config;
    use crate::result;
    use crate::stations;
    use crate::structs::{Notification, Payload};

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    static FAILING_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn failing_fetch(_url: &str, _api_key: &str) -> result::MetroResult<String> {
        FAILING_CALLS.fetch_add(1, Ordering::SeqCst);
        return Err(result::make_error("connection refused"));
    }

    fn fixture_fetch(url: &str, api_key: &str) -> result::MetroResult<String> {
        assert_eq!("test-key", api_key);
        let fixture = if url.contains("/Incidents.svc/") {
            "testdata/incidents.json"
        } else if url.contains("/StationPrediction.svc/") {
            "testdata/trains.json"
        } else {
            "testdata/bus.json"
        };
        return Ok(std::fs::read_to_string(fixture)?);
    }

    fn test_config() -> config::Config {
        let mut config = config::Config::default();
        config.api_key = Some("test-key".to_string());
        config.bus_stops_to_show_list = vec!["1001195".to_string()];
        return config;
    }

    fn drain(rx: &mpsc::Receiver<Notification>) -> Vec<Payload> {
        return rx.try_iter().map(|n| n.payload).collect();
    }

    #[test]
    fn needs_api_key() {
        let (tx, _rx) = mpsc::channel();
        let poller = Poller::new(config::Config::default(), stations::StationTable::default(), fixture_fetch, tx);
        assert!(poller.is_err());
    }

    #[test]
    fn one_round_of_updates() {
        let (tx, rx) = mpsc::channel();
        let mut poller = Poller::new(test_config(), stations::StationTable::default(), fixture_fetch, tx)
            .expect("poller");

        poller.run_once(Duration::from_secs(10));
        assert_eq!(0, poller.in_flight());

        let payloads = drain(&rx);
        assert_eq!(3, payloads.len());

        let mut saw_incidents = false;
        let mut saw_trains = false;
        let mut saw_bus = false;
        for payload in payloads {
            match payload {
                Payload::Incidents(summary) => {
                    saw_incidents = true;
                    assert_eq!(vec!["RD", "BL", "OR", "SV"], summary.affected_lines);
                },
                Payload::StationTrainTimes(stations) => {
                    saw_trains = true;
                    assert_eq!(2, stations.len());
                    assert_eq!(2, stations["A01"].arrivals.len());
                    assert_eq!(None, stations["A01"].station_name);
                },
                Payload::BusTimes(update) => {
                    saw_bus = true;
                    assert_eq!("1001195", update.stop_id);
                },
                other => panic!("unexpected payload {:?}", other),
            }
        }
        assert!(saw_incidents && saw_trains && saw_bus);
        assert_eq!(0, poller.controller().error_count());
    }

    #[test]
    fn backoff_cycle() {
        let (tx, rx) = mpsc::channel();
        let mut poller = Poller::new(test_config(), stations::StationTable::default(), failing_fetch, tx)
            .expect("poller");

        for _ in 0..5 {
            assert_eq!(1, poller.poll_incidents());
            assert!(poller.wait_for_completion(Duration::from_secs(10)));
        }
        assert!(poller.controller().is_suspended());
        assert_eq!(vec![Payload::TooManyErrors], drain(&rx));

        assert_eq!(0, poller.poll_incidents());
        assert_eq!(0, poller.poll_arrivals());
        assert_eq!(5, FAILING_CALLS.load(Ordering::SeqCst));

        poller.check_resume(Instant::now() + crate::backoff::COOLDOWN);
        assert!(!poller.controller().is_suspended());
        assert_eq!(0, poller.controller().error_count());
        assert_eq!(vec![Payload::ResolvedErrors], drain(&rx));

        assert_eq!(2, poller.poll_arrivals());
    }

    #[test]
    fn timers_drive_requests_and_backoff() {
        let (tx, rx) = mpsc::channel();
        let config = test_config();
        let t0 = Instant::now();
        let at = |secs: u64| t0 + Duration::from_secs(secs);
        let mut schedule = Schedule::new(&config, t0);
        let mut poller = Poller::new(config, stations::StationTable::default(), fixture_fetch, tx)
            .expect("poller");

        // Incidents first, arrivals (rail + one bus stop) a second later.
        assert_eq!(Some(at(1)), poller.tick(t0, &mut schedule));
        assert_eq!(1, poller.in_flight());
        assert_eq!(Some(at(1)), poller.tick(t0 + Duration::from_millis(500), &mut schedule));
        assert_eq!(1, poller.in_flight());
        assert_eq!(Some(at(31)), poller.tick(at(1), &mut schedule));
        assert_eq!(3, poller.in_flight());

        for _ in 0..5 {
            poller.handle_completion(Completion{
                request: Request::Incidents,
                body: Err(result::make_error("503")),
            }, at(2));
        }
        assert!(poller.controller().is_suspended());
        assert_eq!(0, poller.in_flight());
        assert_eq!(vec![Payload::TooManyErrors], drain(&rx));

        // Suspended: due ticks issue nothing but move on.
        assert_eq!(Some(at(61)), poller.tick(at(31), &mut schedule));
        assert_eq!(0, poller.in_flight());
        assert_eq!(Some(at(302)), poller.tick(at(301), &mut schedule));
        assert_eq!(0, poller.in_flight());

        assert_eq!(Some(at(331)), poller.tick(at(302), &mut schedule));
        assert!(!poller.controller().is_suspended());
        assert_eq!(vec![Payload::ResolvedErrors], drain(&rx));

        assert_eq!(Some(at(361)), poller.tick(at(331), &mut schedule));
        assert_eq!(2, poller.in_flight());
    }

    #[test]
    fn nothing_to_poll() {
        let mut config = test_config();
        config.show_incidents = false;
        config.show_station_train_times = false;
        config.bus_stops_to_show_list = vec![];
        assert!(Schedule::new(&config, Instant::now()).is_idle());
    }

    #[test]
    fn ticks_do_not_burst() {
        let start = Instant::now();
        let interval = Duration::from_secs(30);
        assert_eq!(start + interval, super::next_tick(start, interval, start));

        let late = start + Duration::from_secs(95);
        assert_eq!(late + interval, super::next_tick(start, interval, late));
    }
}
