extern crate anyhow;
extern crate chrono;
extern crate chrono_tz;
extern crate flexi_logger;
extern crate getopts;
#[macro_use]
extern crate log;
extern crate reqwest;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
extern crate serde_with;

mod aggregate;
mod backoff;
mod bustime;
mod config;
mod debug;
mod drawing;
mod incidents;
mod poller;
mod result;
mod stations;
mod structs;
mod trains;
mod wmata;

use anyhow::Context;

const RENDER_INTERVAL: std::time::Duration = std::time::Duration::from_secs(2);
const ONE_SHOT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

struct Output {
    quiet: bool,
    save_text: Option<String>,
    table: debug::SharedTable,
}

impl Output {
    fn show(&self, state: &structs::DisplayState, config: &config::Config) {
        let rendered = drawing::generate_table(state, config, chrono::Utc::now());

        if !self.quiet {
            println!("{}", rendered);
        }
        if let Some(ref path) = self.save_text {
            if let Err(err) = std::fs::write(path, &rendered) {
                error!("Couldn't save table to {}: {}", path, err);
            }
        }
        match self.table.lock() {
            Ok(mut table) => *table = rendered,
            Err(poisoned) => *poisoned.into_inner() = rendered,
        }
    }
}

fn drain(rx: &std::sync::mpsc::Receiver<structs::Notification>, state: &mut structs::DisplayState) {
    while let Ok(notification) = rx.try_recv() {
        state.apply(notification);
    }
}

fn run() -> result::MetroResult<()> {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = getopts::Options::new();
    opts.optopt("c", "config", "Widget config file.", "FILENAME");
    opts.optflag("o", "one-shot", "Poll everything once, render once and exit.");
    opts.optopt("t", "save-text", "Where to put each rendered table.", "FILENAME");
    opts.optflag("q", "quiet", "Don't print tables to stdout.");
    opts.optopt("l", "log-dir", "Where to write log files.", "DIR");
    opts.optopt("p", "debug-port", "Serve a debug page on this port.", "PORT");

    let matches = opts.parse(&args[1..]).context("while parsing flags")?;

    let log_dir = matches.opt_str("log-dir").unwrap_or(".".to_string());
    let _logger = flexi_logger::Logger::try_with_env_or_str("info")?
        .log_to_file(flexi_logger::FileSpec::default().directory(&log_dir))
        .duplicate_to_stderr(flexi_logger::Duplicate::Warn)
        .start()?;

    let config_path = matches.opt_str("config").unwrap_or("config.json".to_string());
    let config = config::load(&config_path)?;
    let one_shot = matches.opt_present("one-shot");
    info!("Running. config={} one-shot={}", config_path, one_shot);

    let output = Output{
        quiet: matches.opt_present("quiet"),
        save_text: matches.opt_str("save-text"),
        table: std::sync::Arc::new(std::sync::Mutex::new(String::new())),
    };

    if let Some(port) = matches.opt_str("debug-port") {
        let port: u16 = port.parse().with_context(|| format!("bad debug port: {}", port))?;
        let table = output.table.clone();
        let log_dir = log_dir.clone();
        std::thread::Builder::new()
            .name("debug".to_string())
            .spawn(move || {
                if let Err(err) = debug::run_debug_server(port, table, log_dir) {
                    error!("Debug server stopped: {:#}", err);
                }
            })?;
    }

    let station_table = stations::StationTable::load_or_empty(config.station_codes_path());
    let mut state = structs::DisplayState::new(&config.identifier);
    let (tx, rx) = std::sync::mpsc::channel();

    if config.api_key().is_none() {
        error!("No wmata_api_key in {}, not polling", config_path);
        state.set_error(structs::MISSING_API_KEY);
    } else {
        let mut poller = poller::Poller::new(config.clone(), station_table, wmata::real_fetch, tx)?;
        if one_shot {
            poller.run_once(ONE_SHOT_TIMEOUT);
        } else {
            std::thread::Builder::new()
                .name("poller".to_string())
                .spawn(move || poller.run())?;
        }
    }

    if one_shot {
        drain(&rx, &mut state);
        output.show(&state, &config);
        return Ok(());
    }

    loop {
        match rx.recv_timeout(RENDER_INTERVAL) {
            Ok(notification) => {
                state.apply(notification);
                drain(&rx, &mut state);
            },
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {},
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                // No poller (or it gave up); keep the table and its clock fresh.
                std::thread::sleep(RENDER_INTERVAL);
            },
        }
        output.show(&state, &config);
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}
