//! SSE wire format for events.
//!
//! One record per event:
//!
//! ```text
//! id: <id>
//! event: <type>        (only when the event has a type)
//! data: <line 1>
//! data: <line 2>       (one field per line of the payload)
//! <blank line>
//! ```
//!
//! A connection may additionally start with a single `retry: <ms>` record.

use events::{Event, EventId};

/// Render one event as an SSE record. Every line of `data`, split on any of
/// `\r\n`, `\r` or `\n`, becomes its own `data:` field, so the payload's line
/// structure survives the trip to the client.
pub fn format(event: &Event) -> String {
    let mut out = String::with_capacity(event.data.len() + 32);
    out.push_str("id: ");
    out.push_str(&event.id.to_string());
    out.push('\n');

    if let Some(event_type) = &event.event_type {
        out.push_str("event: ");
        out.push_str(event_type);
        out.push('\n');
    }

    for line in split_lines(&event.data) {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }

    out.push('\n');
    out
}

/// The reconnection advisory record sent once at the start of a connection.
pub fn retry(millis: u64) -> String {
    format!("retry: {millis}\n\n")
}

fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(|c: char| c == '\r' || c == '\n') {
        lines.push(&rest[..pos]);
        let skip = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[pos + skip..];
    }
    lines.push(rest);
    lines
}

/// One blank-line-terminated record read back from an SSE stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub id: Option<String>,
    pub event_type: Option<String>,
    pub data: Option<String>,
    pub retry: Option<u64>,
}

impl Record {
    /// Interpret the record as an event, if it carries a numeric id and data.
    pub fn into_event(self) -> Option<Event> {
        let id = self.id?.parse::<EventId>().ok()?;
        Some(Event::new(id, self.event_type, self.data?))
    }
}

/// Parse SSE text into records. Multiple `data:` fields are joined with `\n`;
/// comment lines and unknown fields are ignored; an unterminated trailing
/// record is dropped, matching how clients only dispatch on a blank line.
pub fn parse(text: &str) -> Vec<Record> {
    let mut records = Vec::new();
    let mut current = Record::default();
    let mut touched = false;

    let mut lines = split_lines(text);
    // The last piece is whatever follows the final line break.
    lines.pop();

    for line in lines {
        if line.is_empty() {
            if touched {
                records.push(std::mem::take(&mut current));
                touched = false;
            }
            continue;
        }
        if line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "id" => current.id = Some(value.to_string()),
            "event" => current.event_type = Some(value.to_string()),
            "data" => match &mut current.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => current.data = Some(value.to_string()),
            },
            "retry" => current.retry = value.parse().ok(),
            _ => continue,
        }
        touched = true;
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: u64, event_type: Option<&str>, data: &str) -> Event {
        Event::new(EventId::new(id), event_type.map(str::to_string), data)
    }

    #[test]
    fn test_format_single_line_without_type() {
        assert_eq!(format(&event(0, None, "hello")), "id: 0\ndata: hello\n\n");
    }

    #[test]
    fn test_format_splits_multi_line_data() {
        assert_eq!(
            format(&event(0, None, "line1\nline2")),
            "id: 0\ndata: line1\ndata: line2\n\n"
        );
    }

    #[test]
    fn test_format_includes_event_type() {
        assert_eq!(
            format(&event(0, Some("push"), "hi")),
            "id: 0\nevent: push\ndata: hi\n\n"
        );
    }

    #[test]
    fn test_format_treats_crlf_and_cr_as_line_breaks() {
        assert_eq!(
            format(&event(3, None, "a\r\nb\rc")),
            "id: 3\ndata: a\ndata: b\ndata: c\n\n"
        );
    }

    #[test]
    fn test_format_keeps_empty_and_trailing_lines() {
        assert_eq!(
            format(&event(1, None, "a\n\nb\n")),
            "id: 1\ndata: a\ndata: \ndata: b\ndata: \n\n"
        );
    }

    #[test]
    fn test_retry_record() {
        assert_eq!(retry(10000), "retry: 10000\n\n");
    }

    #[test]
    fn test_parse_reads_back_formatted_events() {
        let published = vec![
            event(0, None, "hello"),
            event(1, Some("push"), "line1\nline2"),
            event(2, None, "  leading spaces\n\ntrailing\n"),
            event(3, Some("empty"), ""),
        ];
        let wire: String = published.iter().map(format).collect();

        let parsed: Vec<Event> = parse(&wire)
            .into_iter()
            .filter_map(Record::into_event)
            .collect();

        assert_eq!(parsed, published);
    }

    #[test]
    fn test_parse_retry_and_comments() {
        let records = parse("retry: 3000\n\n: keep-alive\n\nid: 5\ndata: x\n\n");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].retry, Some(3000));
        assert_eq!(records[1].id.as_deref(), Some("5"));
    }

    #[test]
    fn test_parse_drops_unterminated_record() {
        assert!(parse("id: 0\ndata: partial\n").is_empty());
    }
}
