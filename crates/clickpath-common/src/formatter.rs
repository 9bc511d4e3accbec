use crate::error::SelectorError;
use crate::protocol::{InteractionRecord, SessionMessage};

/// Field names whose values should never be echoed to a terminal.
const DEFAULT_SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "secret",
    "token",
    "key",
    "cvv",
    "ssn",
    "card_number",
    "credit_card",
];

const MASK: &str = "••••••••";

pub fn format_record(record: &InteractionRecord) -> String {
    format!("{} {}", record.event, mask_sensitive_selector(&record.selector))
}

/// Render both selectors for one element, one per line.
pub fn format_selection(
    structural: &str,
    robust: Option<&Result<String, SelectorError>>,
) -> String {
    let mut output = format!("structural: {}", display_or_root(structural));
    match robust {
        Some(Ok(xpath)) => {
            output.push_str(&format!("\nrobust:     {}", mask_sensitive_selector(xpath)))
        }
        Some(Err(e)) => output.push_str(&format!("\nrobust:     <{}>", e)),
        None => {}
    }
    output
}

pub fn format_session_message(msg: &SessionMessage) -> String {
    match msg {
        SessionMessage::UrlChanged(url) => format!("@ {}", url),
        SessionMessage::ScanComplete(_) => "# scan complete".to_string(),
        SessionMessage::Log(text) => format!("# {}", text),
        SessionMessage::SocketError(text) => format!("! socket: {}", text),
        SessionMessage::GuacamoleMsg(text) => format!("! display: {}", text),
    }
}

fn display_or_root(selector: &str) -> &str {
    if selector.is_empty() {
        "<document>"
    } else {
        selector
    }
}

/// Mask `@value='…'` predicates when the selector names a sensitive field.
///
/// Robust paths may anchor on an input's `value` attribute; for password-like
/// inputs that would print the secret itself.
pub fn mask_sensitive_selector(selector: &str) -> String {
    let lower = selector.to_lowercase();
    if !DEFAULT_SENSITIVE_FIELDS.iter().any(|f| lower.contains(f)) {
        return selector.to_string();
    }

    let mut out = String::with_capacity(selector.len());
    let mut rest = selector;
    while let Some(pos) = rest.find("@value=") {
        let (head, tail) = rest.split_at(pos + "@value=".len());
        out.push_str(head);
        let Some(quote) = tail.chars().next().filter(|c| *c == '\'' || *c == '"') else {
            rest = tail;
            continue;
        };
        match tail[1..].find(quote) {
            Some(end) => {
                out.push(quote);
                out.push_str(MASK);
                out.push(quote);
                rest = &tail[end + 2..];
            }
            None => {
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}
