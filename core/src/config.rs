use serde::{Deserialize, Serialize};

use crate::event::DEFAULT_QUEUE_CAPACITY;

pub const DEFAULT_MONITOR_CAPACITY: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub title: String,
    pub host: String,
    pub port: u16,
    /// Show the debug panel and wrap pages in the debug frame.
    pub debug: bool,
    /// Wrap the page body in the bordered site frame.
    pub framed: bool,
    pub theme: String,
    pub event_queue_capacity: usize,
    pub monitor_capacity: usize,
    pub assets_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            title: "Drafter Website".into(),
            host: "localhost".into(),
            port: 8080,
            debug: true,
            framed: true,
            theme: "default".into(),
            event_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            monitor_capacity: DEFAULT_MONITOR_CAPACITY,
            assets_url: "/assets".into(),
        }
    }
}
