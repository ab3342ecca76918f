use anyhow::{anyhow, Result};
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use std::thread;
use std::time::{Duration, Instant};

/// Wait after synthesizing copy before reading the clipboard. The target app
/// gives no completion signal, so this is a race we accept.
pub const SETTLE_DELAY: Duration = Duration::from_millis(200);
/// Wait after synthesizing paste before restoring the user's clipboard.
pub const RESTORE_DELAY: Duration = Duration::from_millis(500);

pub trait Pasteboard {
    fn read_text(&mut self) -> Option<String>;
    fn write_text(&mut self, text: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

pub trait KeySynth {
    fn copy(&mut self) -> Result<()>;
    fn paste(&mut self) -> Result<()>;
}

/// Clipboard contents to put back once `due` has passed.
#[derive(Debug)]
pub struct PendingRestore {
    snapshot: Option<String>,
    due: Instant,
}

impl PendingRestore {
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.due
    }
}

pub struct ClipboardBridge {
    board: Box<dyn Pasteboard>,
    keys: Box<dyn KeySynth>,
    settle: Duration,
    restore: Duration,
}

impl ClipboardBridge {
    pub fn new(board: Box<dyn Pasteboard>, keys: Box<dyn KeySynth>) -> Self {
        Self { board, keys, settle: SETTLE_DELAY, restore: RESTORE_DELAY }
    }

    #[cfg(test)]
    pub fn with_delays(mut self, settle: Duration, restore: Duration) -> Self {
        self.settle = settle;
        self.restore = restore;
        self
    }

    /// Copies the current selection out of the focused app.
    ///
    /// Text on the clipboard is cleared before the copy so an empty
    /// selection reads back as nothing instead of the previous clipboard
    /// text, then put back before returning. A clipboard without text (an
    /// image, files) is left untouched.
    pub fn capture_selection(&mut self) -> Option<String> {
        let snapshot = self.board.read_text();
        if snapshot.is_some() {
            if let Err(e) = self.board.clear() {
                log::warn!("Clipboard clear failed: {}", e);
            }
        }

        if let Err(e) = self.keys.copy() {
            log::error!("Synthesizing copy failed: {}", e);
            self.put_back(snapshot);
            return None;
        }
        thread::sleep(self.settle);

        let captured = self.board.read_text();
        self.put_back(snapshot);

        captured.filter(|s| !s.trim().is_empty())
    }

    /// Pastes `text` over the selection. The returned ticket must be handed
    /// to [`ClipboardBridge::restore`] once due.
    pub fn replace_selection(&mut self, text: &str) -> Result<PendingRestore> {
        let snapshot = self.board.read_text();
        self.board.write_text(text)?;
        if let Err(e) = self.keys.paste() {
            self.put_back(snapshot);
            return Err(e);
        }
        Ok(PendingRestore { snapshot, due: Instant::now() + self.restore })
    }

    pub fn restore(&mut self, pending: PendingRestore) {
        self.put_back(pending.snapshot);
    }

    fn put_back(&mut self, snapshot: Option<String>) {
        if let Some(old) = snapshot {
            if let Err(e) = self.board.write_text(&old) {
                log::warn!("Clipboard restore failed: {}", e);
            }
        }
    }
}

/// System clipboard through arboard.
pub struct SystemPasteboard {
    inner: arboard::Clipboard,
}

impl SystemPasteboard {
    pub fn new() -> Result<Self> {
        Ok(Self { inner: arboard::Clipboard::new()? })
    }
}

impl Pasteboard for SystemPasteboard {
    fn read_text(&mut self) -> Option<String> {
        self.inner.get_text().ok()
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        self.inner.set_text(text.to_owned())?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.inner.clear()?;
        Ok(())
    }
}

/// Synthetic Cmd/Ctrl+C and Cmd/Ctrl+V through enigo. Must live on the
/// main thread on macOS.
pub struct EnigoKeys {
    enigo: Enigo,
}

#[cfg(target_os = "macos")]
const SHORTCUT_MODIFIER: Key = Key::Meta;
#[cfg(not(target_os = "macos"))]
const SHORTCUT_MODIFIER: Key = Key::Control;

// Still held from the hotkey when the chord fires; they would turn Cmd+C
// into Cmd+Shift+C.
#[cfg(target_os = "macos")]
const STRAY_MODIFIERS: [Key; 3] = [Key::Shift, Key::Alt, Key::Control];
#[cfg(not(target_os = "macos"))]
const STRAY_MODIFIERS: [Key; 3] = [Key::Shift, Key::Alt, Key::Meta];

/// Key events for a bare shortcut+`letter` chord.
fn chord_steps(letter: char) -> Vec<(Key, Direction)> {
    let mut steps: Vec<_> = STRAY_MODIFIERS.iter().map(|k| (*k, Direction::Release)).collect();
    steps.push((SHORTCUT_MODIFIER, Direction::Press));
    steps.push((Key::Unicode(letter), Direction::Click));
    steps.push((SHORTCUT_MODIFIER, Direction::Release));
    steps
}

impl EnigoKeys {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow!("keyboard synthesis unavailable: {}", e))?;
        Ok(Self { enigo })
    }

    fn chord(&mut self, letter: char) -> Result<()> {
        let mut pressed = false;
        let mut failed = None;
        for (key, direction) in chord_steps(letter) {
            pressed |= key == SHORTCUT_MODIFIER && direction == Direction::Press;
            // After a failure only releases are sent, so nothing stays held
            if failed.is_some() && direction != Direction::Release {
                continue;
            }
            match self.enigo.key(key, direction) {
                Ok(()) => {}
                Err(e) if !pressed => log::warn!("Releasing {:?} failed: {}", key, e),
                Err(e) => {
                    failed.get_or_insert(anyhow!("{:?} {:?}: {}", key, direction, e));
                }
            }
        }
        failed.map_or(Ok(()), Err)
    }
}

impl KeySynth for EnigoKeys {
    fn copy(&mut self) -> Result<()> {
        self.chord('c')
    }

    fn paste(&mut self) -> Result<()> {
        self.chord('v')
    }
}
