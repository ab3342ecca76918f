use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};

#[cfg(target_os = "macos")]
pub const LABEL: &str = "⌘⇧F";
#[cfg(not(target_os = "macos"))]
pub const LABEL: &str = "Ctrl+Shift+F";

/// Cmd+Shift+F on macOS, Ctrl+Shift+F elsewhere. Not configurable.
pub fn grammar_hotkey() -> HotKey {
    #[cfg(target_os = "macos")]
    let modifiers = Modifiers::META | Modifiers::SHIFT;
    #[cfg(not(target_os = "macos"))]
    let modifiers = Modifiers::CONTROL | Modifiers::SHIFT;
    HotKey::new(Some(modifiers), Code::KeyF)
}

/// Key-down of `hotkey`; releases are ignored.
fn is_press_of(hotkey: &HotKey, event: &GlobalHotKeyEvent) -> bool {
    event.id == hotkey.id() && event.state == HotKeyState::Pressed
}

/// Keeps the OS registration alive for as long as it exists.
pub struct HotkeyTrigger {
    _manager: GlobalHotKeyManager,
    hotkey: HotKey,
}

impl HotkeyTrigger {
    /// Must be called on the main thread on macOS.
    pub fn register() -> Result<Self, global_hotkey::Error> {
        let manager = GlobalHotKeyManager::new()?;
        let hotkey = grammar_hotkey();
        manager.register(hotkey)?;
        log::info!("Registered hotkey {}", LABEL);
        Ok(Self { _manager: manager, hotkey })
    }

    pub fn fires(&self, event: &GlobalHotKeyEvent) -> bool {
        is_press_of(&self.hotkey, event)
    }

    /// Drains pending hotkey events and counts how many fired.
    pub fn poll(&self) -> usize {
        let mut fired = 0;
        while let Ok(event) = GlobalHotKeyEvent::receiver().try_recv() {
            if self.fires(&event) {
                fired += 1;
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: u32, state: HotKeyState) -> GlobalHotKeyEvent {
        GlobalHotKeyEvent { id, state }
    }

    #[test]
    fn hotkey_is_f_with_shift() {
        let hk = grammar_hotkey();
        assert_eq!(hk.key, Code::KeyF);
        assert!(hk.mods.contains(Modifiers::SHIFT));
    }

    #[test]
    fn only_press_of_our_id_matches() {
        let hk = grammar_hotkey();
        let pressed = event(hk.id(), HotKeyState::Pressed);
        let released = event(hk.id(), HotKeyState::Released);
        let other = event(hk.id().wrapping_add(1), HotKeyState::Pressed);

        assert!(is_press_of(&hk, &pressed));
        assert!(!is_press_of(&hk, &released));
        assert!(!is_press_of(&hk, &other));
    }
}
