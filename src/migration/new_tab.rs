//! Upgrade path for the New Tab Page settings record.
//!
//! Version 1 is the flat record from before the widget stack existed: one
//! visibility flag per widget plus `currentStackWidget` naming the card in
//! front. Later versions keep an explicit stack order.

use super::{MigrationChain, MigrationStep};
use crate::core::{CorruptStateError, RawState, Result, ValueKind, present};
use crate::state::{StackWidget, keys, read_widget_list, widget_list_value};
use serde_json::Value;

pub const BASE_VERSION: u32 = 1;
pub const CURRENT_VERSION: u32 = 5;

/// Retired by version 2; the foreground widget is the end of the stack order.
pub const LEGACY_CURRENT_STACK_WIDGET: &str = "currentStackWidget";

type StepResult = std::result::Result<(), CorruptStateError>;

/// The chain every New Tab Page store runs on load.
pub fn new_tab_chain() -> Result<MigrationChain> {
    MigrationChain::new(BASE_VERSION)
        .with_step(
            MigrationStep::new(2, "stack-widget-order", build_stack_order)
                .with_probe(has_stack_order),
        )?
        .with_step(
            MigrationStep::new(3, "removed-stack-widgets", introduce_removed_list)
                .with_probe(has_removed_list),
        )?
        .with_step(
            MigrationStep::new(4, "add-new-stack-widgets", add_new_stack_widgets)
                .with_probe(every_widget_placed),
        )?
        .with_step(
            MigrationStep::new(5, "replace-stack-widgets", replace_stack_widgets)
                .with_probe(no_shown_widget_removed),
        )
}

fn is_shown(raw: &RawState, widget: StackWidget) -> std::result::Result<bool, CorruptStateError> {
    match present(raw, widget.show_key()) {
        None => Ok(false),
        Some(Value::Bool(shown)) => Ok(*shown),
        Some(other) => Err(CorruptStateError::new(
            widget.show_key(),
            "a boolean",
            ValueKind::of(other),
        )),
    }
}

fn stack_lists(
    raw: &RawState,
) -> std::result::Result<(Vec<StackWidget>, Vec<StackWidget>), CorruptStateError> {
    let order = read_widget_list(raw, keys::WIDGET_STACK_ORDER)?.unwrap_or_default();
    let removed = read_widget_list(raw, keys::REMOVED_STACK_WIDGETS)?.unwrap_or_default();
    Ok((order, removed))
}

fn store_lists(raw: &mut RawState, order: &[StackWidget], removed: &[StackWidget]) {
    raw.insert(keys::WIDGET_STACK_ORDER.to_string(), widget_list_value(order));
    raw.insert(
        keys::REMOVED_STACK_WIDGETS.to_string(),
        widget_list_value(removed),
    );
}

fn has_stack_order(raw: &RawState) -> bool {
    present(raw, keys::WIDGET_STACK_ORDER).is_some()
}

/// Shown widgets go behind, in table order; the legacy foreground widget goes
/// on top whether or not it is shown.
fn build_stack_order(raw: &mut RawState) -> StepResult {
    let legacy_current = match present(raw, LEGACY_CURRENT_STACK_WIDGET) {
        None => None,
        Some(Value::String(name)) => StackWidget::from_name(name),
        Some(other) => {
            return Err(CorruptStateError::new(
                LEGACY_CURRENT_STACK_WIDGET,
                "a widget name",
                ValueKind::of(other),
            ));
        }
    };

    if !has_stack_order(raw) {
        let mut order = Vec::new();
        for widget in StackWidget::ALL {
            if Some(widget) != legacy_current && is_shown(raw, widget)? {
                order.push(widget);
            }
        }
        order.extend(legacy_current);
        raw.insert(keys::WIDGET_STACK_ORDER.to_string(), widget_list_value(&order));
    }

    raw.remove(LEGACY_CURRENT_STACK_WIDGET);
    Ok(())
}

fn has_removed_list(raw: &RawState) -> bool {
    present(raw, keys::REMOVED_STACK_WIDGETS).is_some()
}

fn introduce_removed_list(raw: &mut RawState) -> StepResult {
    let (order, removed) = stack_lists(raw)?;
    store_lists(raw, &order, &removed);
    Ok(())
}

fn every_widget_placed(raw: &RawState) -> bool {
    match stack_lists(raw) {
        Ok((order, removed)) => StackWidget::ALL
            .iter()
            .all(|widget| order.contains(widget) || removed.contains(widget)),
        Err(_) => false,
    }
}

/// Widgets this build knows but the record has never placed go to the back
/// of the stack, so they never jump in front of the user's choice.
fn add_new_stack_widgets(raw: &mut RawState) -> StepResult {
    let (order, removed) = stack_lists(raw)?;
    let mut placed: Vec<StackWidget> = StackWidget::ALL
        .into_iter()
        .filter(|widget| !order.contains(widget) && !removed.contains(widget))
        .collect();
    placed.extend(order);
    store_lists(raw, &placed, &removed);
    Ok(())
}

fn no_shown_widget_removed(raw: &RawState) -> bool {
    match stack_lists(raw) {
        Ok((_, removed)) => removed
            .iter()
            .all(|widget| matches!(is_shown(raw, *widget), Ok(false))),
        Err(_) => false,
    }
}

/// A widget that is switched on but sits in the removed list was dropped by
/// mistake; put it back at the back of the stack.
fn replace_stack_widgets(raw: &mut RawState) -> StepResult {
    let (mut order, mut removed) = stack_lists(raw)?;
    let mut restored = Vec::new();
    for widget in removed.clone() {
        if is_shown(raw, widget)? {
            removed.retain(|other| *other != widget);
            if !order.contains(&widget) {
                restored.push(widget);
            }
        }
    }
    restored.append(&mut order);
    store_lists(raw, &restored, &removed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PersistedState;
    use serde_json::json;

    fn raw(value: Value) -> RawState {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_chain_shape() {
        let chain = new_tab_chain().unwrap();
        assert_eq!(chain.base_version(), BASE_VERSION);
        assert_eq!(chain.current_version(), CURRENT_VERSION);
        let versions: Vec<u32> = chain.steps().iter().map(|step| step.version()).collect();
        assert_eq!(versions, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_defaults_are_current() {
        let chain = new_tab_chain().unwrap();
        let unstamped = PersistedState::default().to_fields();
        assert_eq!(chain.detect_version(&unstamped).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_flat_record_gets_stack_order() {
        let chain = new_tab_chain().unwrap();
        let outcome = chain
            .run(raw(json!({
                "showBinance": true,
                "showTogether": true,
                "currentStackWidget": "together",
                "showClock": true,
            })))
            .unwrap();

        assert_eq!(outcome.from_version, 1);
        assert_eq!(outcome.applied.len(), 4);
        let state = outcome.state;
        assert!(state.show_clock);
        assert_eq!(
            state.widget_stack_order,
            vec![
                StackWidget::Rewards,
                StackWidget::Gemini,
                StackWidget::BitcoinDotCom,
                StackWidget::CryptoDotCom,
                StackWidget::Binance,
                StackWidget::Together,
            ]
        );
        assert!(state.removed_stack_widgets.is_empty());
        assert_eq!(state.foreground_stack_widget(), Some(StackWidget::Together));
    }

    #[test]
    fn test_hidden_stack_keeps_foreground_widget() {
        let chain = new_tab_chain().unwrap();
        let state = chain
            .run(raw(json!({"currentStackWidget": "binance"})))
            .unwrap()
            .state;
        assert_eq!(state.widget_stack_order.last(), Some(&StackWidget::Binance));
        assert_eq!(state.foreground_stack_widget(), None);
    }

    #[test]
    fn test_order_without_removed_list() {
        let chain = new_tab_chain().unwrap();
        let outcome = chain
            .run(raw(json!({
                "showBinance": true,
                "widgetStackOrder": ["binance"],
            })))
            .unwrap();
        assert_eq!(outcome.from_version, 2);
        assert!(outcome.state.removed_stack_widgets.is_empty());
        assert_eq!(outcome.state.widget_stack_order.last(), Some(&StackWidget::Binance));
        assert_eq!(outcome.state.widget_stack_order.len(), StackWidget::ALL.len());
    }

    #[test]
    fn test_new_widgets_go_behind_existing_ones() {
        let mut record = raw(json!({
            "widgetStackOrder": ["gemini", "rewards"],
            "removedStackWidgets": ["binance"],
        }));
        add_new_stack_widgets(&mut record).unwrap();
        let (order, removed) = stack_lists(&record).unwrap();
        assert_eq!(
            order,
            vec![
                StackWidget::Together,
                StackWidget::BitcoinDotCom,
                StackWidget::CryptoDotCom,
                StackWidget::Gemini,
                StackWidget::Rewards,
            ]
        );
        assert_eq!(removed, vec![StackWidget::Binance]);
    }

    #[test]
    fn test_shown_widgets_are_taken_out_of_removed() {
        let chain = new_tab_chain().unwrap();
        let outcome = chain
            .run(raw(json!({
                "showGemini": true,
                "widgetStackOrder": ["rewards", "binance", "together", "bitcoinDotCom", "cryptoDotCom"],
                "removedStackWidgets": ["gemini"],
            })))
            .unwrap();
        assert_eq!(outcome.from_version, 4);
        assert_eq!(outcome.applied, vec!["replace-stack-widgets"]);
        assert!(outcome.state.removed_stack_widgets.is_empty());
        assert_eq!(outcome.state.widget_stack_order.first(), Some(&StackWidget::Gemini));
    }

    #[test]
    fn test_steps_are_idempotent_on_current_records() {
        let chain = new_tab_chain().unwrap();
        let current = PersistedState {
            show_rewards: true,
            show_binance: true,
            removed_stack_widgets: vec![StackWidget::Together],
            widget_stack_order: vec![
                StackWidget::Rewards,
                StackWidget::Gemini,
                StackWidget::BitcoinDotCom,
                StackWidget::CryptoDotCom,
                StackWidget::Binance,
            ],
            ..PersistedState::default()
        }
        .to_raw();

        for step in chain.steps() {
            let mut again = current.clone();
            step.apply(&mut again).unwrap();
            assert_eq!(again, current, "step {} changed a current record", step.name());
        }
    }

    #[test]
    fn test_scalar_stack_order_is_corrupt() {
        let chain = new_tab_chain().unwrap();
        let err = chain
            .run(raw(json!({"widgetStackOrder": "binance,gemini"})))
            .unwrap_err();
        assert_eq!(err.field, keys::WIDGET_STACK_ORDER);
        assert_eq!(err.found, ValueKind::String);
    }

    #[test]
    fn test_non_string_foreground_is_corrupt() {
        let chain = new_tab_chain().unwrap();
        let err = chain
            .run(raw(json!({"currentStackWidget": 3})))
            .unwrap_err();
        assert_eq!(err.field, LEGACY_CURRENT_STACK_WIDGET);
    }
}
