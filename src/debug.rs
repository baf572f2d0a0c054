extern crate anyhow;
extern crate pretty_bytes;
extern crate querystring;
extern crate tiny_http;

use crate::result;

pub type SharedTable = std::sync::Arc<std::sync::Mutex<String>>;

pub fn run_debug_server(port: u16, table: SharedTable, log_dir: String) -> result::MetroResult<()> {
    let server = tiny_http::Server::http(("0.0.0.0", port))
        .map_err(|e| anyhow::anyhow!("while binding debug server to port {}: {}", port, e))?;

    debug!("Running debug HTTP server on port {}", port);
    for request in server.incoming_requests() {
        let url = request.url().to_string();
        let (path, query) = match url.find('?') {
            Some(i) => (&url[..i], &url[i + 1..]),
            None => (url.as_str(), ""),
        };

        let response = match path {
            "/" => main_page(&table, &log_dir).map(html),
            "/table" => Ok(plain(current_table(&table))),
            "/dumplog" => dump_log(query, &log_dir).map(plain),
            _ => Err(result::make_error("not found")),
        };

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                debug!("{} -> {}", url, err);
                html("<h1>404</h1><p>Not found!<p>".to_string()).with_status_code(404)
            }
        };
        if let Err(err) = request.respond(response) {
            warn!("Could not answer debug request for {}: {}", url, err);
        }
    }
    return Ok(());
}

fn with_content_type(body: String, content_type: &str) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let response = tiny_http::Response::from_string(body);
    match tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
        Ok(header) => return response.with_header(header),
        Err(_) => return response,
    }
}

fn html(body: String) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    return with_content_type(body, "text/html; charset=utf-8");
}

fn plain(body: String) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    return with_content_type(body, "text/plain; charset=utf-8");
}

fn current_table(table: &SharedTable) -> String {
    match table.lock() {
        Ok(table) => return table.clone(),
        Err(poisoned) => return poisoned.into_inner().clone(),
    }
}

fn which_log(query: &str) -> Option<String> {
    for (k, v) in querystring::querify(query) {
        if k == "log" && v.ends_with(".log") && !v.contains('/') && !v.contains("..") {
            return Some(v.to_string());
        }
    }
    return None;
}

fn dump_log(query: &str, log_dir: &str) -> result::MetroResult<String> {
    let filename = which_log(query).ok_or(result::make_error("no log requested"))?;
    let path = std::path::Path::new(log_dir).join(filename);
    return Ok(std::fs::read_to_string(path)?);
}

fn escape(text: &str) -> String {
    return text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");
}

fn main_page(table: &SharedTable, log_dir: &str) -> result::MetroResult<String> {
    let mut body = format!("<html><body><h1>DC Metro Debug Server</h1><div>Version {}</div>",
                           env!("CARGO_PKG_VERSION"));

    body.push_str(&format!("<div><h2>Current table</h2><pre>{}</pre></div>",
                           escape(&current_table(table))));

    body.push_str("<div><h2>Log files</h2><ul>");
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let filename = entry.file_name().to_string_lossy().to_string();
        if filename.ends_with(".log") {
            body.push_str(&format!("<li><a href='/dumplog?log={}'>{}</a> [{}]</li>",
                                   filename, filename,
                                   pretty_bytes::converter::convert(entry.metadata()?.len() as f64)));
        }
    }
    body.push_str("</ul></div>");

    body.push_str("</body></html>");
    return Ok(body);
}

#[cfg(test)]
mod tests {
    #[test]
    fn which_log() {
        assert_eq!(Some("dcmetro_2024.log".to_string()), super::which_log("log=dcmetro_2024.log"));
        assert_eq!(Some("a.log".to_string()), super::which_log("x=1&log=a.log"));
        assert_eq!(None, super::which_log("log=Cargo.toml"));
        assert_eq!(None, super::which_log("log=../secret.log"));
        assert_eq!(None, super::which_log(""));
    }

    #[test]
    fn escapes_table() {
        assert_eq!("a &lt;b&gt; &amp; c", super::escape("a <b> & c"));
    }

    #[test]
    fn main_page_lists_logs() {
        let dir = std::env::temp_dir().join(format!("dcmetro_debug_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("dcmetro.log"), "hello").unwrap();
        std::fs::write(dir.join("notes.txt"), "skip").unwrap();

        let table = std::sync::Arc::new(std::sync::Mutex::new("Metro Center".to_string()));
        let page = super::main_page(&table, dir.to_str().unwrap()).unwrap();
        assert!(page.contains("<pre>Metro Center</pre>"));
        assert!(page.contains("/dumplog?log=dcmetro.log"));
        assert!(!page.contains("notes.txt"));

        assert_eq!("hello", super::dump_log("log=dcmetro.log", dir.to_str().unwrap()).unwrap());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
