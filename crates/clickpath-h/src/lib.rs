pub mod cdp;
pub mod inject;
pub mod recorder;

pub use recorder::HeadlessRecorder;
