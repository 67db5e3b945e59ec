use super::persisted::{
    ClockFormat, StackWidget, keys, read_bool, read_clock_format, read_widget_list,
};
use crate::core::{RawState, Result, StoreError, present};

/// A partial update of [`PersistedState`](super::PersistedState).
///
/// Unset fields leave the current value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatePatch {
    pub show_background_image: Option<bool>,
    pub show_stats: Option<bool>,
    pub show_clock: Option<bool>,
    pub clock_format: Option<ClockFormat>,
    pub show_top_sites: Option<bool>,
    pub custom_links_enabled: Option<bool>,
    pub is_branded_wallpaper_notification_dismissed: Option<bool>,
    pub show_empty_page: Option<bool>,
    pub show_rewards: Option<bool>,
    pub show_binance: Option<bool>,
    pub show_together: Option<bool>,
    pub show_gemini: Option<bool>,
    pub show_bitcoin_dot_com: Option<bool>,
    pub show_crypto_dot_com: Option<bool>,
    pub widget_stack_order: Option<Vec<StackWidget>>,
    pub removed_stack_widgets: Option<Vec<StackWidget>>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show_background_image(mut self, value: bool) -> Self {
        self.show_background_image = Some(value);
        self
    }

    pub fn show_stats(mut self, value: bool) -> Self {
        self.show_stats = Some(value);
        self
    }

    pub fn show_clock(mut self, value: bool) -> Self {
        self.show_clock = Some(value);
        self
    }

    pub fn clock_format(mut self, value: ClockFormat) -> Self {
        self.clock_format = Some(value);
        self
    }

    pub fn show_top_sites(mut self, value: bool) -> Self {
        self.show_top_sites = Some(value);
        self
    }

    pub fn custom_links_enabled(mut self, value: bool) -> Self {
        self.custom_links_enabled = Some(value);
        self
    }

    pub fn branded_wallpaper_notification_dismissed(mut self, value: bool) -> Self {
        self.is_branded_wallpaper_notification_dismissed = Some(value);
        self
    }

    pub fn show_empty_page(mut self, value: bool) -> Self {
        self.show_empty_page = Some(value);
        self
    }

    /// Sets the visibility flag that belongs to `widget`.
    pub fn show_widget(mut self, widget: StackWidget, value: bool) -> Self {
        let slot = match widget {
            StackWidget::Rewards => &mut self.show_rewards,
            StackWidget::Binance => &mut self.show_binance,
            StackWidget::Together => &mut self.show_together,
            StackWidget::Gemini => &mut self.show_gemini,
            StackWidget::BitcoinDotCom => &mut self.show_bitcoin_dot_com,
            StackWidget::CryptoDotCom => &mut self.show_crypto_dot_com,
        };
        *slot = Some(value);
        self
    }

    pub fn widget_stack_order(mut self, order: Vec<StackWidget>) -> Self {
        self.widget_stack_order = Some(order);
        self
    }

    pub fn removed_stack_widgets(mut self, removed: Vec<StackWidget>) -> Self {
        self.removed_stack_widgets = Some(removed);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Builds a patch from caller-supplied key/value pairs.
    ///
    /// Unlike records read from disk, unknown keys are an error here.
    pub fn from_raw(raw: &RawState) -> Result<Self> {
        if let Some(unknown) = raw.keys().find(|key| !keys::ALL.contains(&key.as_str())) {
            return Err(StoreError::UnknownField(unknown.clone()));
        }

        fn flag(raw: &RawState, key: &str) -> Result<Option<bool>> {
            if present(raw, key).is_none() {
                return Ok(None);
            }
            let mut value = false;
            read_bool(raw, key, &mut value)?;
            Ok(Some(value))
        }

        Ok(Self {
            show_background_image: flag(raw, keys::SHOW_BACKGROUND_IMAGE)?,
            show_stats: flag(raw, keys::SHOW_STATS)?,
            show_clock: flag(raw, keys::SHOW_CLOCK)?,
            clock_format: read_clock_format(raw)?,
            show_top_sites: flag(raw, keys::SHOW_TOP_SITES)?,
            custom_links_enabled: flag(raw, keys::CUSTOM_LINKS_ENABLED)?,
            is_branded_wallpaper_notification_dismissed: flag(
                raw,
                keys::IS_BRANDED_WALLPAPER_NOTIFICATION_DISMISSED,
            )?,
            show_empty_page: flag(raw, keys::SHOW_EMPTY_PAGE)?,
            show_rewards: flag(raw, keys::SHOW_REWARDS)?,
            show_binance: flag(raw, keys::SHOW_BINANCE)?,
            show_together: flag(raw, keys::SHOW_TOGETHER)?,
            show_gemini: flag(raw, keys::SHOW_GEMINI)?,
            show_bitcoin_dot_com: flag(raw, keys::SHOW_BITCOIN_DOT_COM)?,
            show_crypto_dot_com: flag(raw, keys::SHOW_CRYPTO_DOT_COM)?,
            widget_stack_order: read_widget_list(raw, keys::WIDGET_STACK_ORDER)?,
            removed_stack_widgets: read_widget_list(raw, keys::REMOVED_STACK_WIDGETS)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PersistedState;
    use serde_json::json;

    #[test]
    fn test_apply_only_touches_set_fields() {
        let mut state = PersistedState::default();
        state.apply(
            &StatePatch::new()
                .show_clock(true)
                .clock_format(ClockFormat::TwentyFourHour)
                .show_widget(StackWidget::Gemini, true),
        );

        assert!(state.show_clock);
        assert!(state.show_gemini);
        assert_eq!(state.clock_format, ClockFormat::TwentyFourHour);
        assert!(!state.show_stats);
        assert!(state.is_branded_wallpaper_notification_dismissed);
    }

    #[test]
    fn test_empty_patch() {
        assert!(StatePatch::new().is_empty());
        assert!(!StatePatch::new().show_stats(false).is_empty());
    }

    #[test]
    fn test_from_raw() {
        let raw = json!({"showTopSites": true, "clockFormat": "12"});
        let patch = StatePatch::from_raw(raw.as_object().unwrap()).unwrap();
        assert_eq!(
            patch,
            StatePatch::new()
                .show_top_sites(true)
                .clock_format(ClockFormat::TwelveHour)
        );
    }

    #[test]
    fn test_from_raw_rejects_unknown_and_mistyped() {
        let raw = json!({"showClok": true});
        assert!(matches!(
            StatePatch::from_raw(raw.as_object().unwrap()),
            Err(StoreError::UnknownField(key)) if key == "showClok"
        ));

        let raw = json!({"showClock": 1});
        assert!(matches!(
            StatePatch::from_raw(raw.as_object().unwrap()),
            Err(StoreError::CorruptState(_))
        ));
    }
}
