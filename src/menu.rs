//! Fixed layout of the tray menu.
//!
//! The tray binding walks [`LAYOUT`] once to build native items and keeps a
//! handle per slot; events and updates go through those handles.

use crate::config::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Disabled title line showing the hotkey.
    Header,
    Separator,
    /// Clickable status line, re-checks the API.
    Status,
    /// "Model" submenu; its entries come from [`Model::ALL`].
    Models,
    Preferences,
    Quit,
}

pub const LAYOUT: [Slot; 9] = [
    Slot::Header,
    Slot::Separator,
    Slot::Status,
    Slot::Separator,
    Slot::Models,
    Slot::Separator,
    Slot::Preferences,
    Slot::Separator,
    Slot::Quit,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    CheckStatus,
    SelectModel(Model),
    OpenPreferences,
    Quit,
}

pub fn header_title(hotkey_label: &str) -> String {
    format!("Grammar Check ({})", hotkey_label)
}

pub const MODELS_TITLE: &str = "Model";
pub const PREFERENCES_TITLE: &str = "Preferences...";
pub const QUIT_TITLE: &str = "Quit";

/// Check state of each model entry, indexed by [`Model::index`].
pub fn model_checks(selected: Model) -> [bool; 3] {
    let mut checks = [false; 3];
    checks[selected.index()] = true;
    checks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_model_checked() {
        for m in Model::ALL {
            let checks = model_checks(m);
            assert_eq!(checks.iter().filter(|c| **c).count(), 1);
            assert!(checks[m.index()]);
        }
    }

    #[test]
    fn layout_has_one_of_each_actionable_slot() {
        for slot in [Slot::Header, Slot::Status, Slot::Models, Slot::Preferences, Slot::Quit] {
            assert_eq!(LAYOUT.iter().filter(|s| **s == slot).count(), 1, "{:?}", slot);
        }
        assert_eq!(LAYOUT.last(), Some(&Slot::Quit));
    }
}
