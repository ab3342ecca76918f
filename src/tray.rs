use crate::config::Model;
use crate::menu::{self, MenuAction, Slot, LAYOUT};
use crate::status::{Glyph, Status, StatusSink};
use anyhow::Result;
use tray_icon::menu::accelerator::{Accelerator, Code, Modifiers};
use tray_icon::menu::{
    CheckMenuItem, Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem, Submenu,
};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

const ICON_SIZE: usize = 18;

/// Status-bar icon plus direct handles to the items that change. Not `Send`;
/// create and use on the main thread.
pub struct TrayHandle {
    tray: TrayIcon,
    status_item: MenuItem,
    model_items: [CheckMenuItem; 3],
}

/// Maps menu clicks back to actions by id.
pub struct MenuRouter {
    actions: Vec<(MenuId, MenuAction)>,
}

impl MenuRouter {
    /// Non-blocking poll of menu clicks.
    pub fn pump(&self) -> Vec<MenuAction> {
        let mut out = Vec::new();
        while let Ok(event) = MenuEvent::receiver().try_recv() {
            if let Some(action) = self.resolve(&event.id) {
                out.push(action);
            }
        }
        out
    }

    fn resolve(&self, id: &MenuId) -> Option<MenuAction> {
        self.actions.iter().find(|(known, _)| known == id).map(|(_, action)| *action)
    }
}

#[cfg(target_os = "macos")]
const SHORTCUT: Modifiers = Modifiers::META;
#[cfg(not(target_os = "macos"))]
const SHORTCUT: Modifiers = Modifiers::CONTROL;

impl TrayHandle {
    pub fn new(hotkey_label: &str, selected: Model) -> Result<(Self, MenuRouter)> {
        let menu = Menu::new();
        let status_item = MenuItem::new(Status::Ok.menu_title(false), true, None);
        let checks = menu::model_checks(selected);
        let model_items =
            Model::ALL.map(|m| CheckMenuItem::new(m.label(), true, checks[m.index()], None));
        let preferences = MenuItem::new(
            menu::PREFERENCES_TITLE,
            true,
            Some(Accelerator::new(Some(SHORTCUT), Code::Comma)),
        );
        let quit = MenuItem::new(
            menu::QUIT_TITLE,
            true,
            Some(Accelerator::new(Some(SHORTCUT), Code::KeyQ)),
        );

        let mut actions = vec![
            (status_item.id().clone(), MenuAction::CheckStatus),
            (preferences.id().clone(), MenuAction::OpenPreferences),
            (quit.id().clone(), MenuAction::Quit),
        ];
        for (item, model) in model_items.iter().zip(Model::ALL) {
            actions.push((item.id().clone(), MenuAction::SelectModel(model)));
        }

        for slot in LAYOUT {
            match slot {
                Slot::Header => {
                    let header = MenuItem::new(menu::header_title(hotkey_label), false, None);
                    menu.append(&header)?;
                }
                Slot::Separator => menu.append(&PredefinedMenuItem::separator())?,
                Slot::Status => menu.append(&status_item)?,
                Slot::Models => {
                    let sub = Submenu::new(menu::MODELS_TITLE, true);
                    for item in &model_items {
                        sub.append(item)?;
                    }
                    menu.append(&sub)?;
                }
                Slot::Preferences => menu.append(&preferences)?,
                Slot::Quit => menu.append(&quit)?,
            }
        }

        let tray = TrayIconBuilder::new()
            .with_tooltip("Rewrite")
            .with_menu(Box::new(menu))
            .with_icon(icon_for(Glyph::Pencil)?)
            .with_icon_as_template(cfg!(target_os = "macos"))
            .build()?;

        Ok((Self { tray, status_item, model_items }, MenuRouter { actions }))
    }
}

impl StatusSink for TrayHandle {
    fn show_status(&mut self, _status: Status, glyph: Glyph, title: &str) {
        match icon_for(glyph) {
            Ok(icon) => {
                if let Err(e) = self.tray.set_icon(Some(icon)) {
                    log::warn!("Tray icon update failed: {}", e);
                }
            }
            Err(e) => log::warn!("Tray icon build failed: {}", e),
        }
        self.status_item.set_text(title);
    }

    fn show_model(&mut self, model: Model) {
        let checks = menu::model_checks(model);
        for (item, checked) in self.model_items.iter().zip(checks) {
            item.set_checked(checked);
        }
    }
}

/// Used when the tray can't be created; the app still works via hotkey.
pub struct NoTray;

impl StatusSink for NoTray {
    fn show_status(&mut self, status: Status, _glyph: Glyph, _title: &str) {
        log::debug!("Status {:?} (no tray)", status);
    }

    fn show_model(&mut self, _model: Model) {}
}

fn icon_for(glyph: Glyph) -> Result<Icon> {
    let rgba = glyph_rgba(glyph);
    Ok(Icon::from_rgba(rgba, ICON_SIZE as u32, ICON_SIZE as u32)?)
}

// Template icons on macOS only use alpha; elsewhere draw in teal.
#[cfg(target_os = "macos")]
const INK: [u8; 3] = [0x00, 0x00, 0x00];
#[cfg(not(target_os = "macos"))]
const INK: [u8; 3] = [0x14, 0xB8, 0xA6];

/// Draws one of the three status glyphs as RGBA.
fn glyph_rgba(glyph: Glyph) -> Vec<u8> {
    let mut rgba = vec![0u8; ICON_SIZE * ICON_SIZE * 4];
    for y in 0..ICON_SIZE {
        for x in 0..ICON_SIZE {
            // 2x2 supersampling for soft edges
            let mut hits = 0u32;
            for (dx, dy) in [(0.25, 0.25), (0.75, 0.25), (0.25, 0.75), (0.75, 0.75)] {
                if inked(glyph, x as f32 + dx, y as f32 + dy) {
                    hits += 1;
                }
            }
            if hits > 0 {
                let i = (y * ICON_SIZE + x) * 4;
                rgba[i..i + 3].copy_from_slice(&INK);
                rgba[i + 3] = (hits * 255 / 4) as u8;
            }
        }
    }
    rgba
}

fn inked(glyph: Glyph, x: f32, y: f32) -> bool {
    match glyph {
        Glyph::Pencil => {
            // Shaft from lower-left to upper-right, with a point at the bottom
            seg_dist(x, y, (5.5, 12.5), (14.0, 4.0)) < 1.8
                || seg_dist(x, y, (3.0, 15.0), (5.5, 12.5)) < 0.9
        }
        Glyph::Warning => {
            let (a, b, c) = ((9.0, 2.0), (1.5, 16.0), (16.5, 16.0));
            let outline = seg_dist(x, y, a, b) < 1.0
                || seg_dist(x, y, b, c) < 1.0
                || seg_dist(x, y, c, a) < 1.0;
            let bang = seg_dist(x, y, (9.0, 7.0), (9.0, 11.0)) < 1.0
                || ((x - 9.0).powi(2) + (y - 13.5).powi(2)).sqrt() < 1.0;
            outline || bang
        }
        Glyph::Ellipsis => {
            let r = ((x - 9.0).powi(2) + (y - 9.0).powi(2)).sqrt();
            let ring = (r - 7.5).abs() < 0.9;
            let dot = [5.5, 9.0, 12.5]
                .iter()
                .any(|cx| ((x - cx).powi(2) + (y - 9.0).powi(2)).sqrt() < 1.2);
            ring || dot
        }
    }
}

fn seg_dist(px: f32, py: f32, a: (f32, f32), b: (f32, f32)) -> f32 {
    let (vx, vy) = (b.0 - a.0, b.1 - a.1);
    let len2 = vx * vx + vy * vy;
    let t = (((px - a.0) * vx + (py - a.1) * vy) / len2).clamp(0.0, 1.0);
    let (cx, cy) = (a.0 + t * vx, a.1 + t * vy);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(rgba: &[u8]) -> usize {
        rgba.chunks(4).filter(|p| p[3] > 0).count()
    }

    #[test]
    fn glyphs_have_ink_and_differ() {
        let all = [Glyph::Pencil, Glyph::Warning, Glyph::Ellipsis].map(glyph_rgba);
        for g in &all {
            assert_eq!(g.len(), ICON_SIZE * ICON_SIZE * 4);
            let c = coverage(g);
            assert!(c > 10 && c < ICON_SIZE * ICON_SIZE / 2, "coverage {}", c);
        }
        assert_ne!(all[0], all[1]);
        assert_ne!(all[1], all[2]);
        assert_ne!(all[0], all[2]);
    }

    #[test]
    fn router_resolves_known_ids_only() {
        let router = MenuRouter {
            actions: vec![
                (MenuId::new("status"), MenuAction::CheckStatus),
                (MenuId::new("mini"), MenuAction::SelectModel(Model::Gpt4oMini)),
            ],
        };
        assert_eq!(router.resolve(&MenuId::new("mini")), Some(MenuAction::SelectModel(Model::Gpt4oMini)));
        assert_eq!(router.resolve(&MenuId::new("status")), Some(MenuAction::CheckStatus));
        assert_eq!(router.resolve(&MenuId::new("header")), None);
    }

    #[test]
    fn segment_distance() {
        assert_eq!(seg_dist(0.0, 0.0, (0.0, 0.0), (4.0, 0.0)), 0.0);
        assert!((seg_dist(2.0, 3.0, (0.0, 0.0), (4.0, 0.0)) - 3.0).abs() < 1e-6);
        assert!((seg_dist(7.0, 0.0, (0.0, 0.0), (4.0, 0.0)) - 3.0).abs() < 1e-6);
    }
}
