/// The in-page click capture script.
/// Injected into every document by recorder backends; it reports clicks as
/// `CLICKPATH_CAPTURE{json}` console messages.
pub const CAPTURE_JS: &str = include_str!("capture.js");
