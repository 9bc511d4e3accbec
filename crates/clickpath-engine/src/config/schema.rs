use crate::reporter::ReporterConfig;
use crate::selector::RobulaOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickpathConfig {
    #[serde(default)]
    pub reporter: ReporterConfig,
    #[serde(default)]
    pub robula: RobulaOptions,
    #[serde(default)]
    pub recorder: RecorderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Show the browser window instead of running headless.
    #[serde(default)]
    pub visible: bool,
    #[serde(default = "default_start_url")]
    pub start_url: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            visible: false,
            start_url: default_start_url(),
        }
    }
}

fn default_start_url() -> String {
    "about:blank".to_string()
}
