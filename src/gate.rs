//! Category gate: decides whether events of a category are recorded.
//!
//! Interceptors always forward; the store consults the gate at record time so
//! toggling a category mid-session needs no re-patching.

use crate::config::BugBubbleConfig;
use crate::model::Category;

/// `false` only when tracking is switched off globally or the category is
/// explicitly overridden to `false`. Missing tracking options fail open.
pub fn is_enabled(category: Category, config: &BugBubbleConfig) -> bool {
    let Some(tracking) = config.tracking_options.as_ref() else {
        return true;
    };
    if !tracking.enabled {
        return false;
    }
    tracking.options.get(category) != Some(false)
}

/// All categories the gate lets through, in display order.
pub fn enabled_categories(config: &BugBubbleConfig) -> Vec<Category> {
    Category::ALL
        .into_iter()
        .filter(|category| is_enabled(*category, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CategoryOverrides, TrackingOptions};

    fn with_tracking(tracking: Option<TrackingOptions>) -> BugBubbleConfig {
        BugBubbleConfig {
            tracking_options: tracking,
            ..Default::default()
        }
    }

    #[test]
    fn missing_tracking_options_fail_open() {
        let config = with_tracking(None);
        for category in Category::ALL {
            assert!(is_enabled(category, &config));
        }
    }

    #[test]
    fn master_switch_disables_everything() {
        let config = with_tracking(Some(TrackingOptions {
            enabled: false,
            options: CategoryOverrides::all_enabled(),
        }));
        assert!(enabled_categories(&config).is_empty());
    }

    #[test]
    fn absent_override_means_enabled() {
        let config = with_tracking(Some(TrackingOptions {
            enabled: true,
            options: CategoryOverrides {
                network: Some(false),
                ..Default::default()
            },
        }));
        assert!(!is_enabled(Category::Network, &config));
        assert!(is_enabled(Category::Socket, &config));
        assert_eq!(
            enabled_categories(&config),
            vec![Category::Console, Category::Socket, Category::Analytics]
        );
    }
}
