// src/router/hints.rs
// Static follow-up suggestion table, consulted after every successful
// tool call. Advisory only; never changes semantics.

pub struct ResponseHint {
    pub suggest: &'static [&'static str],
    pub tip: Option<&'static str>,
}

/// Keyed by original (unprefixed) tool name, since the same tool may be
/// exposed bare or namespaced depending on provider precedence.
const HINTS: &[(&str, ResponseHint)] = &[
    (
        "list_emails",
        ResponseHint {
            suggest: &["get_email"],
            tip: Some("fetch a specific message with get_email once you have an id"),
        },
    ),
    (
        "get_email",
        ResponseHint {
            suggest: &["send_email", "list_emails"],
            tip: None,
        },
    ),
    (
        "list_files",
        ResponseHint {
            suggest: &["read_file"],
            tip: None,
        },
    ),
    (
        "search",
        ResponseHint {
            suggest: &["get"],
            tip: Some("search results carry ids usable with get"),
        },
    ),
];

pub fn lookup(original_name: &str) -> Option<&'static ResponseHint> {
    HINTS.iter().find(|(name, _)| *name == original_name).map(|(_, hint)| hint)
}
