use serde::{Deserialize, Serialize};

/// Process-wide client configuration shared by every maintenance activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gui: GuiItem,

    #[serde(default)]
    pub subscriptions: Vec<SubscriptionItem>,

    #[serde(default = "default_geo_sources")]
    pub geo_sources: Vec<GeoSource>,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

/// Update cadence settings. An interval of zero disables the activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuiItem {
    #[serde(default = "default_interval_hours")]
    pub auto_update_interval_hours: u32,

    #[serde(default = "default_interval_hours")]
    pub auto_update_core_interval_hours: u32,

    #[serde(default)]
    pub check_pre_release: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionItem {
    pub id: String,

    #[serde(default)]
    pub remarks: String,

    #[serde(default)]
    pub url: String,

    /// Zero disables automatic refresh.
    #[serde(default)]
    pub auto_update_interval_minutes: u32,

    /// Unix seconds of the last successful refresh.
    #[serde(default)]
    pub last_update_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoSource {
    pub file_name: String,
    pub url: String,
}

fn default_interval_hours() -> u32 {
    10
}

fn default_http_timeout() -> u64 {
    30
}

fn default_task_timeout() -> u64 {
    30 * 60
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_geo_sources() -> Vec<GeoSource> {
    const BASE: &str = "https://github.com/Loyalsoldier/v2ray-rules-dat/releases/latest/download";
    ["geoip.dat", "geosite.dat"]
        .into_iter()
        .map(|file_name| GeoSource {
            file_name: file_name.to_string(),
            url: format!("{BASE}/{file_name}"),
        })
        .collect()
}

impl Default for GuiItem {
    fn default() -> Self {
        Self {
            auto_update_interval_hours: default_interval_hours(),
            auto_update_core_interval_hours: default_interval_hours(),
            check_pre_release: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gui: GuiItem::default(),
            subscriptions: Vec::new(),
            geo_sources: default_geo_sources(),
            http_timeout_secs: default_http_timeout(),
            task_timeout_secs: default_task_timeout(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn subscription(&self, id: &str) -> Option<&SubscriptionItem> {
        self.subscriptions.iter().find(|item| item.id == id)
    }

    pub fn subscription_mut(&mut self, id: &str) -> Option<&mut SubscriptionItem> {
        self.subscriptions.iter_mut().find(|item| item.id == id)
    }
}

impl SubscriptionItem {
    #[must_use]
    pub fn new(id: impl Into<String>, url: impl Into<String>, interval_minutes: u32) -> Self {
        Self {
            id: id.into(),
            remarks: String::new(),
            url: url.into(),
            auto_update_interval_minutes: interval_minutes,
            last_update_time: 0,
        }
    }

    /// Whether the item should be refreshed at `now` (unix seconds).
    #[must_use]
    pub fn is_due(&self, now: i64) -> bool {
        self.auto_update_interval_minutes > 0
            && now - self.last_update_time >= i64::from(self.auto_update_interval_minutes) * 60
    }

    #[must_use]
    pub fn label(&self) -> &str {
        if self.remarks.is_empty() {
            &self.id
        } else {
            &self.remarks
        }
    }
}
