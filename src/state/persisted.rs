use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::patch::StatePatch;
use crate::core::{CorruptStateError, RawState, ValueKind, present};
use crate::migration::CURRENT_VERSION;

/// Wire names of the persisted fields.
pub mod keys {
    pub const SHOW_BACKGROUND_IMAGE: &str = "showBackgroundImage";
    pub const SHOW_STATS: &str = "showStats";
    pub const SHOW_CLOCK: &str = "showClock";
    pub const CLOCK_FORMAT: &str = "clockFormat";
    pub const SHOW_TOP_SITES: &str = "showTopSites";
    pub const CUSTOM_LINKS_ENABLED: &str = "customLinksEnabled";
    pub const IS_BRANDED_WALLPAPER_NOTIFICATION_DISMISSED: &str =
        "isBrandedWallpaperNotificationDismissed";
    pub const SHOW_EMPTY_PAGE: &str = "showEmptyPage";
    pub const SHOW_REWARDS: &str = "showRewards";
    pub const SHOW_BINANCE: &str = "showBinance";
    pub const SHOW_TOGETHER: &str = "showTogether";
    pub const SHOW_GEMINI: &str = "showGemini";
    pub const SHOW_BITCOIN_DOT_COM: &str = "showBitcoinDotCom";
    pub const SHOW_CRYPTO_DOT_COM: &str = "showCryptoDotCom";
    pub const WIDGET_STACK_ORDER: &str = "widgetStackOrder";
    pub const REMOVED_STACK_WIDGETS: &str = "removedStackWidgets";

    /// Stamped on every record the store writes; not part of the typed shape.
    pub const SCHEMA_VERSION: &str = "schemaVersion";

    /// Every key of the current persisted shape, in wire order.
    pub const ALL: [&str; 16] = [
        SHOW_BACKGROUND_IMAGE,
        SHOW_STATS,
        SHOW_CLOCK,
        CLOCK_FORMAT,
        SHOW_TOP_SITES,
        CUSTOM_LINKS_ENABLED,
        IS_BRANDED_WALLPAPER_NOTIFICATION_DISMISSED,
        SHOW_EMPTY_PAGE,
        SHOW_REWARDS,
        SHOW_BINANCE,
        SHOW_TOGETHER,
        SHOW_GEMINI,
        SHOW_BITCOIN_DOT_COM,
        SHOW_CRYPTO_DOT_COM,
        WIDGET_STACK_ORDER,
        REMOVED_STACK_WIDGETS,
    ];
}

/// A widget that lives in the card stack in the corner of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StackWidget {
    Rewards,
    Binance,
    Together,
    Gemini,
    BitcoinDotCom,
    CryptoDotCom,
}

impl StackWidget {
    /// Known widgets in table order.
    pub const ALL: [StackWidget; 6] = [
        StackWidget::Rewards,
        StackWidget::Binance,
        StackWidget::Together,
        StackWidget::Gemini,
        StackWidget::BitcoinDotCom,
        StackWidget::CryptoDotCom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rewards => "rewards",
            Self::Binance => "binance",
            Self::Together => "together",
            Self::Gemini => "gemini",
            Self::BitcoinDotCom => "bitcoinDotCom",
            Self::CryptoDotCom => "cryptoDotCom",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|widget| widget.as_str() == name)
    }

    /// Key of the boolean that controls this widget's visibility.
    pub fn show_key(self) -> &'static str {
        match self {
            Self::Rewards => keys::SHOW_REWARDS,
            Self::Binance => keys::SHOW_BINANCE,
            Self::Together => keys::SHOW_TOGETHER,
            Self::Gemini => keys::SHOW_GEMINI,
            Self::BitcoinDotCom => keys::SHOW_BITCOIN_DOT_COM,
            Self::CryptoDotCom => keys::SHOW_CRYPTO_DOT_COM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClockFormat {
    /// Follow the locale's convention.
    #[default]
    #[serde(rename = "")]
    Locale,
    #[serde(rename = "12")]
    TwelveHour,
    #[serde(rename = "24")]
    TwentyFourHour,
}

impl ClockFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Locale => "",
            Self::TwelveHour => "12",
            Self::TwentyFourHour => "24",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" => Some(Self::Locale),
            "12" => Some(Self::TwelveHour),
            "24" => Some(Self::TwentyFourHour),
            _ => None,
        }
    }
}

/// User preferences that survive across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub show_background_image: bool,
    pub show_stats: bool,
    pub show_clock: bool,
    pub clock_format: ClockFormat,
    pub show_top_sites: bool,
    pub custom_links_enabled: bool,
    pub is_branded_wallpaper_notification_dismissed: bool,
    pub show_empty_page: bool,
    pub show_rewards: bool,
    pub show_binance: bool,
    pub show_together: bool,
    pub show_gemini: bool,
    pub show_bitcoin_dot_com: bool,
    pub show_crypto_dot_com: bool,
    /// Back of the stack first; the last entry is in the foreground.
    pub widget_stack_order: Vec<StackWidget>,
    pub removed_stack_widgets: Vec<StackWidget>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            show_background_image: false,
            show_stats: false,
            show_clock: false,
            clock_format: ClockFormat::Locale,
            show_top_sites: false,
            custom_links_enabled: false,
            is_branded_wallpaper_notification_dismissed: true,
            show_empty_page: false,
            show_rewards: false,
            show_binance: false,
            show_together: false,
            show_gemini: false,
            show_bitcoin_dot_com: false,
            show_crypto_dot_com: false,
            widget_stack_order: StackWidget::ALL.to_vec(),
            removed_stack_widgets: Vec::new(),
        }
    }
}

impl PersistedState {
    /// Types a migrated record, filling every absent field from defaults.
    ///
    /// Keys outside the current shape are ignored. A known key holding the
    /// wrong kind of value fails the whole conversion.
    pub fn from_raw(raw: &RawState) -> Result<Self, CorruptStateError> {
        let mut state = Self::default();

        read_bool(raw, keys::SHOW_BACKGROUND_IMAGE, &mut state.show_background_image)?;
        read_bool(raw, keys::SHOW_STATS, &mut state.show_stats)?;
        read_bool(raw, keys::SHOW_CLOCK, &mut state.show_clock)?;
        if let Some(format) = read_clock_format(raw)? {
            state.clock_format = format;
        }
        read_bool(raw, keys::SHOW_TOP_SITES, &mut state.show_top_sites)?;
        read_bool(raw, keys::CUSTOM_LINKS_ENABLED, &mut state.custom_links_enabled)?;
        read_bool(
            raw,
            keys::IS_BRANDED_WALLPAPER_NOTIFICATION_DISMISSED,
            &mut state.is_branded_wallpaper_notification_dismissed,
        )?;
        read_bool(raw, keys::SHOW_EMPTY_PAGE, &mut state.show_empty_page)?;
        read_bool(raw, keys::SHOW_REWARDS, &mut state.show_rewards)?;
        read_bool(raw, keys::SHOW_BINANCE, &mut state.show_binance)?;
        read_bool(raw, keys::SHOW_TOGETHER, &mut state.show_together)?;
        read_bool(raw, keys::SHOW_GEMINI, &mut state.show_gemini)?;
        read_bool(raw, keys::SHOW_BITCOIN_DOT_COM, &mut state.show_bitcoin_dot_com)?;
        read_bool(raw, keys::SHOW_CRYPTO_DOT_COM, &mut state.show_crypto_dot_com)?;
        if let Some(order) = read_widget_list(raw, keys::WIDGET_STACK_ORDER)? {
            state.widget_stack_order = order;
        }
        if let Some(removed) = read_widget_list(raw, keys::REMOVED_STACK_WIDGETS)? {
            state.removed_stack_widgets = removed;
        }

        Ok(state)
    }

    /// Untyped form of this state, stamped with [`CURRENT_VERSION`].
    ///
    /// Running the New Tab Page chain over the result yields `self` unchanged.
    pub fn to_raw(&self) -> RawState {
        self.to_record(CURRENT_VERSION)
    }

    /// Untyped form stamped with the shape version it was written at.
    pub fn to_record(&self, schema_version: u32) -> RawState {
        let mut raw = self.to_fields();
        raw.insert(keys::SCHEMA_VERSION.to_string(), Value::from(schema_version));
        raw
    }

    /// The persisted fields alone, without a version stamp.
    pub(crate) fn to_fields(&self) -> RawState {
        let mut raw = RawState::new();
        let mut put_bool = |key: &str, value: bool| {
            raw.insert(key.to_string(), Value::Bool(value));
        };
        put_bool(keys::SHOW_BACKGROUND_IMAGE, self.show_background_image);
        put_bool(keys::SHOW_STATS, self.show_stats);
        put_bool(keys::SHOW_CLOCK, self.show_clock);
        put_bool(keys::SHOW_TOP_SITES, self.show_top_sites);
        put_bool(keys::CUSTOM_LINKS_ENABLED, self.custom_links_enabled);
        put_bool(
            keys::IS_BRANDED_WALLPAPER_NOTIFICATION_DISMISSED,
            self.is_branded_wallpaper_notification_dismissed,
        );
        put_bool(keys::SHOW_EMPTY_PAGE, self.show_empty_page);
        put_bool(keys::SHOW_REWARDS, self.show_rewards);
        put_bool(keys::SHOW_BINANCE, self.show_binance);
        put_bool(keys::SHOW_TOGETHER, self.show_together);
        put_bool(keys::SHOW_GEMINI, self.show_gemini);
        put_bool(keys::SHOW_BITCOIN_DOT_COM, self.show_bitcoin_dot_com);
        put_bool(keys::SHOW_CRYPTO_DOT_COM, self.show_crypto_dot_com);

        raw.insert(
            keys::CLOCK_FORMAT.to_string(),
            Value::String(self.clock_format.as_str().to_string()),
        );
        raw.insert(
            keys::WIDGET_STACK_ORDER.to_string(),
            widget_list_value(&self.widget_stack_order),
        );
        raw.insert(
            keys::REMOVED_STACK_WIDGETS.to_string(),
            widget_list_value(&self.removed_stack_widgets),
        );
        raw
    }

    pub fn is_widget_shown(&self, widget: StackWidget) -> bool {
        match widget {
            StackWidget::Rewards => self.show_rewards,
            StackWidget::Binance => self.show_binance,
            StackWidget::Together => self.show_together,
            StackWidget::Gemini => self.show_gemini,
            StackWidget::BitcoinDotCom => self.show_bitcoin_dot_com,
            StackWidget::CryptoDotCom => self.show_crypto_dot_com,
        }
    }

    /// The widget on top of the stack, if any visible widget is stacked.
    pub fn foreground_stack_widget(&self) -> Option<StackWidget> {
        self.widget_stack_order
            .iter()
            .rev()
            .copied()
            .find(|widget| {
                self.is_widget_shown(*widget) && !self.removed_stack_widgets.contains(widget)
            })
    }

    /// Merges every field the patch sets.
    pub fn apply(&mut self, patch: &StatePatch) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut self.show_background_image, &patch.show_background_image);
        set(&mut self.show_stats, &patch.show_stats);
        set(&mut self.show_clock, &patch.show_clock);
        set(&mut self.clock_format, &patch.clock_format);
        set(&mut self.show_top_sites, &patch.show_top_sites);
        set(&mut self.custom_links_enabled, &patch.custom_links_enabled);
        set(
            &mut self.is_branded_wallpaper_notification_dismissed,
            &patch.is_branded_wallpaper_notification_dismissed,
        );
        set(&mut self.show_empty_page, &patch.show_empty_page);
        set(&mut self.show_rewards, &patch.show_rewards);
        set(&mut self.show_binance, &patch.show_binance);
        set(&mut self.show_together, &patch.show_together);
        set(&mut self.show_gemini, &patch.show_gemini);
        set(&mut self.show_bitcoin_dot_com, &patch.show_bitcoin_dot_com);
        set(&mut self.show_crypto_dot_com, &patch.show_crypto_dot_com);
        set(&mut self.widget_stack_order, &patch.widget_stack_order);
        set(&mut self.removed_stack_widgets, &patch.removed_stack_widgets);
    }
}

pub(crate) fn read_bool(
    raw: &RawState,
    key: &str,
    target: &mut bool,
) -> Result<(), CorruptStateError> {
    match present(raw, key) {
        None => Ok(()),
        Some(Value::Bool(value)) => {
            *target = *value;
            Ok(())
        }
        Some(other) => Err(CorruptStateError::new(key, "a boolean", ValueKind::of(other))),
    }
}

pub(crate) fn read_clock_format(raw: &RawState) -> Result<Option<ClockFormat>, CorruptStateError> {
    let Some(value) = present(raw, keys::CLOCK_FORMAT) else {
        return Ok(None);
    };
    value
        .as_str()
        .and_then(ClockFormat::parse)
        .map(Some)
        .ok_or_else(|| {
            CorruptStateError::new(
                keys::CLOCK_FORMAT,
                "one of \"\", \"12\", \"24\"",
                ValueKind::of(value),
            )
        })
}

/// Reads a list of widget names.
///
/// Names this build does not know are dropped, as are repeats.
pub fn read_widget_list(
    raw: &RawState,
    key: &str,
) -> Result<Option<Vec<StackWidget>>, CorruptStateError> {
    let Some(value) = present(raw, key) else {
        return Ok(None);
    };
    let Value::Array(items) = value else {
        return Err(CorruptStateError::new(
            key,
            "a list of widget names",
            ValueKind::of(value),
        ));
    };

    let mut widgets = Vec::with_capacity(items.len());
    for item in items {
        let Value::String(name) = item else {
            return Err(CorruptStateError::new(
                key,
                "a list of widget names",
                ValueKind::of(item),
            ));
        };
        if let Some(widget) = StackWidget::from_name(name) {
            if !widgets.contains(&widget) {
                widgets.push(widget);
            }
        }
    }
    Ok(Some(widgets))
}

pub fn widget_list_value(widgets: &[StackWidget]) -> Value {
    Value::Array(
        widgets
            .iter()
            .map(|widget| Value::String(widget.as_str().to_string()))
            .collect(),
    )
}
