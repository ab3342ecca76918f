use crate::app::{AppContext, CheckJob, CorrectionJob, Outcome};
use crate::client::CorrectionClient;
use crate::clipboard::ClipboardBridge;
use crate::config::{Config, Model};
use crate::hotkey::{self, HotkeyTrigger};
use crate::menu::MenuAction;
use crate::status::{StatusController, StatusSink};
use crate::tray::{MenuRouter, NoTray, TrayHandle};
use anyhow::anyhow;
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use egui_phosphor::regular as icons;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// How often the hidden window wakes up to poll tray, hotkey and requests.
const POLL_INTERVAL: Duration = Duration::from_millis(120);
/// Tighter polling while a request or clipboard restore is outstanding.
const BUSY_POLL_INTERVAL: Duration = Duration::from_millis(40);
/// Startup API check runs once the menu bar item is up.
const STARTUP_CHECK_DELAY: Duration = Duration::from_secs(1);

/// Everything `main` prepares before the event loop exists.
pub struct Startup {
    pub config: Config,
    pub config_path: PathBuf,
    pub client: CorrectionClient,
    pub bridge: ClipboardBridge,
    pub runtime: tokio::runtime::Handle,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Tab {
    General,
    About,
}

struct RewriteApp {
    app: AppContext,
    router: Option<MenuRouter>,
    hotkey: Option<HotkeyTrigger>,
    client: CorrectionClient,
    runtime: tokio::runtime::Handle,
    outcome_tx: Sender<Outcome>,
    outcome_rx: Receiver<Outcome>,
    egui_ctx: egui::Context,
    key_draft: String,
    tab: Tab,
    quitting: bool,
}

impl RewriteApp {
    /// Runs inside the event loop so tray and hotkey land on the main thread.
    fn new(cc: &eframe::CreationContext<'_>, startup: Startup) -> Self {
        let mut fonts = egui::FontDefinitions::default();
        egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
        cc.egui_ctx.set_fonts(fonts);

        let selected = startup.config.selected_model;
        let (sink, router) = match TrayHandle::new(hotkey::LABEL, selected) {
            Ok((tray, router)) => {
                log::info!("Tray created");
                (Box::new(tray) as Box<dyn StatusSink>, Some(router))
            }
            Err(e) => {
                log::error!("Tray failed: {:#}", e);
                (Box::new(NoTray) as Box<dyn StatusSink>, None)
            }
        };

        let hotkey = match HotkeyTrigger::register() {
            Ok(h) => Some(h),
            Err(e) => {
                log::error!("Registering {} failed (in use?): {}", hotkey::LABEL, e);
                None
            }
        };

        let key_draft = startup.config.api_key.clone();
        let status = StatusController::new(sink, !startup.config.has_api_key());
        let app = AppContext::new(startup.config, startup.config_path, status, startup.bridge);
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded();

        let mut this = Self {
            app,
            router,
            hotkey,
            client: startup.client,
            runtime: startup.runtime,
            outcome_tx,
            outcome_rx,
            egui_ctx: cc.egui_ctx.clone(),
            key_draft,
            tab: Tab::General,
            quitting: false,
        };

        log::info!("Checking API status at {}", this.client.base_url());
        if let Some(job) = this.app.on_check_requested() {
            this.spawn_check(job, STARTUP_CHECK_DELAY);
        }
        this
    }

    fn spawn_correction(&self, job: CorrectionJob) {
        let client = self.client.clone();
        let tx = self.outcome_tx.clone();
        let ctx = self.egui_ctx.clone();
        self.runtime.spawn(async move {
            let res = client.fix_grammar(&job.text, &job.api_key, job.model.id()).await;
            let _ = tx.send(Outcome::Corrected(res));
            ctx.request_repaint();
        });
    }

    fn spawn_check(&self, job: CheckJob, delay: Duration) {
        let client = self.client.clone();
        let tx = self.outcome_tx.clone();
        let ctx = self.egui_ctx.clone();
        self.runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = client.check_status(&job.api_key).await;
            let _ = tx.send(Outcome::Checked { generation: job.generation, result });
            ctx.request_repaint();
        });
    }

    fn request_check(&mut self) {
        if let Some(job) = self.app.on_check_requested() {
            self.spawn_check(job, Duration::ZERO);
        }
    }

    /// Drains every event source. Order matters little: all of it runs on
    /// this thread, one event at a time.
    fn pump(&mut self, ctx: &egui::Context) {
        let fired = self.hotkey.as_ref().map_or(0, HotkeyTrigger::poll);
        for _ in 0..fired {
            if let Some(job) = self.app.on_hotkey() {
                self.spawn_correction(job);
            }
        }

        let actions = self.router.as_ref().map(MenuRouter::pump).unwrap_or_default();
        for action in actions {
            log::debug!("Menu: {:?}", action);
            match action {
                MenuAction::CheckStatus => self.request_check(),
                MenuAction::SelectModel(model) => self.app.select_model(model),
                MenuAction::OpenPreferences => self.app.request_settings(),
                MenuAction::Quit => {
                    log::info!("Quit requested");
                    self.quitting = true;
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            }
        }

        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.app.on_outcome(outcome);
        }

        self.app.tick(Instant::now());
    }

    fn show_settings(&mut self, ctx: &egui::Context) {
        self.key_draft = self.app.api_key().to_string();
        ctx.send_viewport_cmd(egui::ViewportCommand::Visible(true));
        ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
        log::info!("Settings window shown");
    }

    fn general_tab(&mut self, ui: &mut egui::Ui) {
        ui.heading("API Key");
        ui.add_space(8.0);

        let field = ui.add(
            egui::TextEdit::singleline(&mut self.key_draft)
                .password(true)
                .hint_text("Enter your OpenAI API Key")
                .desired_width(f32::INFINITY),
        );
        if field.changed() {
            self.app.set_api_key(self.key_draft.trim());
        }
        if field.lost_focus() {
            self.request_check();
        }

        ui.label(
            egui::RichText::new(format!(
                "Your API key is needed to use the grammar check feature.\nIt is stored in {}",
                Config::path().display()
            ))
            .small()
            .weak(),
        );

        ui.add_space(12.0);
        ui.horizontal(|ui| {
            ui.label("Model:");
            let mut model = self.app.model();
            egui::ComboBox::from_id_source("model")
                .selected_text(model.label())
                .show_ui(ui, |ui| {
                    for m in Model::ALL {
                        ui.selectable_value(&mut model, m, m.label());
                    }
                });
            if model != self.app.model() {
                self.app.select_model(model);
            }
        });
        ui.label(self.app.status().menu_title(self.app.api_key().trim().is_empty()));
    }

    fn about_tab(&self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(8.0);
            ui.label(egui::RichText::new(icons::PENCIL_LINE).size(56.0));
            ui.label(egui::RichText::new("Rewrite").size(28.0).strong());
            ui.label(egui::RichText::new(format!("Version {}", env!("CARGO_PKG_VERSION"))).weak());
            ui.add_space(4.0);
            ui.label(
                egui::RichText::new(format!(
                    "A simple grammar checking tool.\nPress {} to check grammar in any text field.",
                    hotkey::LABEL
                ))
                .small(),
            );
        });
    }
}

impl eframe::App for RewriteApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.pump(ctx);
        // Keep polling even while the window is hidden
        let busy = self.app.is_processing() || self.app.has_pending_restore();
        ctx.request_repaint_after(if busy { BUSY_POLL_INTERVAL } else { POLL_INTERVAL });

        if self.app.take_settings_request() {
            self.show_settings(ctx);
        }

        // Closing the window only hides it; the app lives in the menu bar
        if ctx.input(|i| i.viewport().close_requested()) && !self.quitting {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            ctx.send_viewport_cmd(egui::ViewportCommand::Visible(false));
        }

        egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.tab, Tab::General, format!("{} General", icons::GEAR));
                ui.selectable_value(&mut self.tab, Tab::About, format!("{} About", icons::INFO));
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.tab {
            Tab::General => self.general_tab(ui),
            Tab::About => self.about_tab(ui),
        });
    }
}

fn native_options() -> eframe::NativeOptions {
    let mut options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Preferences")
            .with_inner_size([450.0, 250.0])
            .with_resizable(false)
            .with_visible(false),
        ..Default::default()
    };

    // Menu-bar only: no Dock icon, no app menu
    #[cfg(target_os = "macos")]
    {
        use winit::platform::macos::{ActivationPolicy, EventLoopBuilderExtMacOS};
        options.event_loop_builder = Some(Box::new(|builder| {
            builder.with_activation_policy(ActivationPolicy::Accessory);
        }));
    }
    #[cfg(not(target_os = "macos"))]
    {
        options.centered = true;
    }

    options
}

/// Runs the UI event loop on the main thread (blocks until quit).
pub fn run(startup: Startup) -> anyhow::Result<()> {
    log::info!("Main UI: starting event loop");
    eframe::run_native(
        "Rewrite",
        native_options(),
        Box::new(move |cc| Box::new(RewriteApp::new(cc, startup))),
    )
    .map_err(|e| anyhow!("UI event loop failed: {}", e))?;
    log::info!("Main UI: event loop exited");
    Ok(())
}
