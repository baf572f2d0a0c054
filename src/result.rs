extern crate anyhow;

pub type MetroResult<T> = anyhow::Result<T>;

pub fn make_error(msg: &str) -> anyhow::Error {
    return anyhow::anyhow!(msg.to_string());
}

const SNIPPET_CHARS: usize = 200;

/// The start of a response body, for error messages.
pub fn snippet(body: &str) -> String {
    match body.char_indices().nth(SNIPPET_CHARS) {
        Some((end, _)) => return format!("{}...", &body[..end]),
        None => return body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn snippet() {
        assert_eq!("{\"Trains\": []}", super::snippet("{\"Trains\": []}"));

        let page = format!("<html>{}</html>", "x".repeat(500));
        let short = super::snippet(&page);
        assert_eq!(203, short.chars().count());
        assert!(short.starts_with("<html>xxx"));
        assert!(short.ends_with("x..."));

        assert_eq!(format!("{}...", "é".repeat(200)), super::snippet(&"é".repeat(201)));
    }
}
