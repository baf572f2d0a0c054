extern crate chrono;
extern crate chrono_tz;

use crate::bustime;
use crate::config;
use crate::incidents;
use crate::structs;
use crate::trains;

const WAITING: &str = "Waiting For Update...";
const ANSI_RESET: &str = "\x1b[0m";

enum Row {
    Title(String),
    Heading(String),
    Text(String),
    Cells { line: String, destination: String, minutes: String },
}

fn cells(line: &str, destination: &str, minutes: &str) -> Row {
    return Row::Cells{
        line: line.to_string(),
        destination: destination.to_string(),
        minutes: minutes.to_string(),
    };
}

fn line_color(code: &str) -> Option<&'static str> {
    match code {
        "BL" => Some("\x1b[38;5;39m"),
        "GR" => Some("\x1b[32m"),
        "OR" => Some("\x1b[38;5;208m"),
        "RD" => Some("\x1b[31m"),
        "SV" => Some("\x1b[37m"),
        "YL" => Some("\x1b[33m"),
        _ => None,
    }
}

fn paint(text: &str, code: &str, colorize: bool) -> String {
    if !colorize {
        return text.to_string();
    }
    match line_color(code) {
        Some(color) => return format!("{}{}{}", color, text, ANSI_RESET),
        None => return text.to_string(),
    }
}

/// "Incidents Reported On Red, Orange, and Silver Lines", or just the codes.
pub fn incident_text(lines: &[String], codes_only: bool, colorize: bool) -> String {
    if codes_only {
        return lines.iter()
            .map(|code| paint(code, code, colorize))
            .collect::<Vec<String>>()
            .join("  ");
    }

    let count = lines.len();
    let mut text = String::new();
    text.push_str(if count == 1 { "Incident Reported On " } else { "Incidents Reported On " });
    for (i, code) in lines.iter().enumerate() {
        let last = i == count - 1;
        if last && count > 1 {
            text.push_str("and ");
        }
        text.push_str(&paint(incidents::line_name(code).unwrap_or(code.as_str()), code, colorize));
        if !last && count > 2 {
            text.push(',');
        }
        text.push(' ');
    }
    text.push_str(if count == 1 { "Line" } else { "Lines" });
    return text;
}

/// Shifts a predicted minute count by the whole minutes elapsed since the
/// prediction was fetched.
pub fn diff_time(value: &str,
                 update_time: Option<chrono::DateTime<chrono::Utc>>,
                 now: chrono::DateTime<chrono::Utc>) -> String {
    let update_time = match update_time {
        Some(t) => t,
        None => return format!("{}?", value),
    };

    let delay = (now - update_time).num_seconds().div_euclid(60);
    if delay == 0 {
        return value.to_string();
    }

    match trains::leading_integer(value) {
        None => return format!("{}-{}", value, delay),
        Some(v) if v < delay => return "past".to_string(),
        Some(v) => return (v - delay).to_string(),
    }
}

pub fn diff_times(values: &str,
                  update_time: Option<chrono::DateTime<chrono::Utc>>,
                  now: chrono::DateTime<chrono::Utc>) -> String {
    return values.split(", ")
        .map(|v| diff_time(v, update_time, now))
        .collect::<Vec<String>>()
        .join(", ");
}

pub fn delay_text(then: chrono::DateTime<chrono::Utc>, now: chrono::DateTime<chrono::Utc>) -> String {
    let delay_ms = (now - then).num_milliseconds();
    if delay_ms < 2000 {
        return "just recently".to_string();
    }
    if delay_ms < 60000 {
        return format!("{} seconds ago", (delay_ms as f64 / 1000.0).round());
    }
    let minutes = delay_ms as f64 / 60000.0;
    if minutes < 1.5 {
        return "1 minute ago".to_string();
    }
    if minutes < 60.0 {
        return format!("{} minutes ago", minutes.round());
    }
    let hours = minutes / 60.0;
    if hours < 1.5 {
        return "1 hour ago".to_string();
    }
    if hours < 24.0 {
        return format!("{} hours ago", hours.round());
    }
    let days = hours / 24.0;
    if days < 1.5 {
        return "1 day ago".to_string();
    }
    return format!("{} days ago", days.round());
}

fn truncated<T>(rows: &[T], max_rows: usize) -> &[T] {
    if max_rows != 0 && max_rows < rows.len() {
        return &rows[..max_rows];
    }
    return rows;
}

fn add_incidents(rows: &mut Vec<Row>, state: &structs::DisplayState, config: &config::Config) {
    if !config.show_incidents {
        return;
    }
    let summary = match state.incidents {
        Some(ref summary) => summary,
        None => return,
    };

    rows.push(Row::Heading("Incidents".to_string()));
    if summary.affected_lines.is_empty() {
        rows.push(Row::Text("No Incidents Reported".to_string()));
    } else {
        rows.push(Row::Text(incident_text(
            &summary.affected_lines, config.incident_codes_only, config.colorize_lines)));
    }
}

fn add_trains(rows: &mut Vec<Row>, state: &structs::DisplayState, config: &config::Config,
              now: chrono::DateTime<chrono::Utc>) {
    if !config.show_station_train_times {
        return;
    }
    let data = match state.trains {
        Some(ref data) => data,
        None => return,
    };

    for code in &config.stations_to_show_list {
        let view = match data.stations.get(code) {
            Some(view) => view,
            None => continue,
        };
        rows.push(Row::Heading(view.station_name.clone().unwrap_or(code.clone())));

        if view.arrivals.is_empty() {
            rows.push(cells("--", "No Trains", ""));
            continue;
        }
        for arrival in truncated(&view.arrivals, config.max_train_times_per_station) {
            rows.push(cells(&arrival.line, &arrival.destination,
                            &diff_times(&arrival.minutes, Some(data.time), now)));
        }
    }
}

fn add_buses(rows: &mut Vec<Row>, state: &structs::DisplayState, config: &config::Config) {
    let updates = config.bus_stops_to_show_list.iter()
        .filter_map(|stop_id| state.buses.get(stop_id));

    for (stop_name, arrivals) in bustime::group_by_stop_name(updates, config.max_train_times_per_station) {
        rows.push(Row::Heading(stop_name));
        for arrival in arrivals {
            rows.push(cells(&arrival.line, &arrival.destination, &arrival.minutes));
        }
    }
}

fn layout(rows: &[Row], colorize: bool) -> String {
    let mut widths = [0usize; 3];
    for row in rows {
        if let Row::Cells { line, destination, minutes } = row {
            widths[0] = std::cmp::max(widths[0], line.chars().count());
            widths[1] = std::cmp::max(widths[1], destination.chars().count());
            widths[2] = std::cmp::max(widths[2], minutes.chars().count());
        }
    }

    let mut out = String::new();
    for row in rows {
        match row {
            Row::Title(text) => {
                out.push_str(text);
                out.push('\n');
                out.push_str(&"=".repeat(text.chars().count()));
            },
            Row::Heading(text) => {
                out.push_str(text);
                out.push('\n');
                out.push_str(&"-".repeat(text.chars().count()));
            },
            Row::Text(text) => out.push_str(text),
            Row::Cells { line, destination, minutes } => {
                let padded_line = format!("{:<width$}", line, width = widths[0]);
                let formatted = format!("{}  {:<w1$}  {:>w2$}",
                                        paint(&padded_line, line, colorize),
                                        destination, minutes,
                                        w1 = widths[1], w2 = widths[2]);
                out.push_str(formatted.trim_end());
            },
        }
        out.push('\n');
    }
    return out;
}

/// Renders the whole widget as a three-column text table.
pub fn generate_table(state: &structs::DisplayState,
                      config: &config::Config,
                      now: chrono::DateTime<chrono::Utc>) -> String {
    let mut rows = vec![];
    if config.show_header {
        rows.push(Row::Title(config.header_text.clone()));
    }

    if let Some(ref message) = state.error_message {
        rows.push(Row::Text(message.clone()));
        return layout(&rows, false);
    }
    let last_updated = match state.last_updated {
        Some(t) => t,
        None => {
            rows.push(Row::Text(WAITING.to_string()));
            return layout(&rows, false);
        }
    };

    add_incidents(&mut rows, state, config);
    add_trains(&mut rows, state, config, now);
    add_buses(&mut rows, state, config);

    let local = last_updated.with_timezone(&config.tz());
    rows.push(Row::Text(format!("Updated {} ({})",
                                delay_text(last_updated, now),
                                local.format("%-I:%M %p"))));
    return layout(&rows, config.colorize_lines);
}
