//! Configuration for the observability layer
//!
//! A full [`BugBubbleConfig`] always exists; hosts supply a [`PartialConfig`]
//! at initialization which is merged over the defaults. Category overrides
//! merge key by key, so enabling one category never resets another.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::model::Category;

pub const DEFAULT_MAX_LOGS: usize = 1000;

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugBubbleConfig {
    /// Buffer capacity; oldest entries are evicted beyond this
    pub max_logs: usize,
    pub floating_button_position: ButtonPosition,
    /// `None` means everything is tracked
    pub tracking_options: Option<TrackingOptions>,
}

/// Screen offsets of the floating trigger, consumed by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ButtonPosition {
    pub top: f32,
    pub right: f32,
}

impl Default for ButtonPosition {
    fn default() -> Self {
        Self {
            top: 100.0,
            right: 20.0,
        }
    }
}

/// Master switch plus per-category overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingOptions {
    pub enabled: bool,
    #[serde(default)]
    pub options: CategoryOverrides,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            options: CategoryOverrides::all_enabled(),
        }
    }
}

/// Per-category overrides; an absent value means "enabled"
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<bool>,
    #[serde(default, alias = "socket", skip_serializing_if = "Option::is_none")]
    pub websocket: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<bool>,
}

impl CategoryOverrides {
    pub fn all_enabled() -> Self {
        Self {
            network: Some(true),
            websocket: Some(true),
            console: Some(true),
            analytics: Some(true),
        }
    }

    pub fn get(&self, category: Category) -> Option<bool> {
        match category {
            Category::Network => self.network,
            Category::Socket => self.websocket,
            Category::Console => self.console,
            Category::Analytics => self.analytics,
        }
    }

    pub fn set(&mut self, category: Category, value: Option<bool>) {
        match category {
            Category::Network => self.network = value,
            Category::Socket => self.websocket = value,
            Category::Console => self.console = value,
            Category::Analytics => self.analytics = value,
        }
    }

    /// Overlay `other` on top of `self`, key by key.
    pub fn merged_with(&self, other: &CategoryOverrides) -> Self {
        Self {
            network: other.network.or(self.network),
            websocket: other.websocket.or(self.websocket),
            console: other.console.or(self.console),
            analytics: other.analytics.or(self.analytics),
        }
    }
}

/// Configuration as supplied by the host; every field optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialConfig {
    #[serde(default)]
    pub max_logs: Option<usize>,
    #[serde(default)]
    pub floating_button_position: Option<ButtonPosition>,
    #[serde(default)]
    pub tracking_options: Option<PartialTrackingOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialTrackingOptions {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub options: Option<CategoryOverrides>,
}

impl PartialConfig {
    pub fn with_max_logs(mut self, max_logs: usize) -> Self {
        self.max_logs = Some(max_logs);
        self
    }

    pub fn with_tracking_enabled(mut self, enabled: bool) -> Self {
        self.tracking_options
            .get_or_insert_with(PartialTrackingOptions::default)
            .enabled = Some(enabled);
        self
    }

    pub fn with_category(mut self, category: Category, enabled: bool) -> Self {
        self.tracking_options
            .get_or_insert_with(PartialTrackingOptions::default)
            .options
            .get_or_insert_with(CategoryOverrides::default)
            .set(category, Some(enabled));
        self
    }
}

impl Default for BugBubbleConfig {
    fn default() -> Self {
        Self {
            max_logs: DEFAULT_MAX_LOGS,
            floating_button_position: ButtonPosition::default(),
            tracking_options: Some(TrackingOptions::default()),
        }
    }
}

impl BugBubbleConfig {
    /// Merge a partial configuration over `self`.
    ///
    /// `max_logs == 0` is rejected in favour of the current value.
    pub fn merged(&self, partial: &PartialConfig) -> Self {
        let max_logs = match partial.max_logs {
            Some(0) => {
                log::warn!(
                    "[Config] maxLogs must be positive, keeping {}",
                    self.max_logs
                );
                self.max_logs
            }
            Some(n) => n,
            None => self.max_logs,
        };

        let tracking_options = match &partial.tracking_options {
            Some(incoming) => {
                let current = self.tracking_options.clone().unwrap_or_default();
                Some(TrackingOptions {
                    enabled: incoming.enabled.unwrap_or(current.enabled),
                    options: match &incoming.options {
                        Some(overrides) => current.options.merged_with(overrides),
                        None => current.options,
                    },
                })
            }
            None => self.tracking_options.clone(),
        };

        Self {
            max_logs,
            floating_button_position: partial
                .floating_button_position
                .unwrap_or(self.floating_button_position),
            tracking_options,
        }
    }

    /// Defaults merged with `partial`.
    pub fn from_partial(partial: &PartialConfig) -> Self {
        Self::default().merged(partial)
    }

    /// Load a partial configuration from a JSON file and merge it over defaults
    ///
    /// # Returns
    /// The merged configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<PartialConfig>(&contents) {
                Ok(partial) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    Self::from_partial(&partial)
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BugBubbleConfig::default();
        assert_eq!(config.max_logs, 1000);
        assert_eq!(config.floating_button_position.top, 100.0);
        let tracking = config.tracking_options.unwrap();
        assert!(tracking.enabled);
        assert_eq!(tracking.options, CategoryOverrides::all_enabled());
    }

    #[test]
    fn merge_overrides_key_by_key() {
        let partial = PartialConfig::default().with_category(Category::Console, false);
        let config = BugBubbleConfig::from_partial(&partial);
        let options = config.tracking_options.unwrap().options;
        assert_eq!(options.console, Some(false));
        assert_eq!(options.network, Some(true));
        assert_eq!(options.analytics, Some(true));
    }

    #[test]
    fn merge_keeps_enabled_when_only_options_given() {
        let partial = PartialConfig {
            tracking_options: Some(PartialTrackingOptions {
                enabled: None,
                options: None,
            }),
            ..Default::default()
        };
        let config = BugBubbleConfig::from_partial(&partial);
        assert!(config.tracking_options.unwrap().enabled);
    }

    #[test]
    fn zero_max_logs_falls_back() {
        let config = BugBubbleConfig::from_partial(&PartialConfig::default().with_max_logs(0));
        assert_eq!(config.max_logs, DEFAULT_MAX_LOGS);
    }

    #[test]
    fn parses_host_json_shape() {
        let json = r#"{
            "maxLogs": 50,
            "floatingButtonPosition": { "top": 10, "right": 4 },
            "trackingOptions": { "enabled": true, "options": { "websocket": false } }
        }"#;
        let partial: PartialConfig = serde_json::from_str(json).unwrap();
        let config = BugBubbleConfig::from_partial(&partial);
        assert_eq!(config.max_logs, 50);
        assert_eq!(config.floating_button_position.right, 4.0);
        let options = config.tracking_options.unwrap().options;
        assert_eq!(options.websocket, Some(false));
        assert_eq!(options.console, Some(true));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = BugBubbleConfig::load_from_file("/nonexistent/bugbubble.json");
        assert_eq!(config, BugBubbleConfig::default());
    }
}
