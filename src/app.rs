use crate::client::CorrectionError;
use crate::clipboard::{ClipboardBridge, PendingRestore};
use crate::config::{Config, Model};
use crate::status::{Status, StatusController};
use std::path::PathBuf;
use std::time::Instant;

/// Everything a correction request needs, detached from the context so it
/// can run off the UI thread.
#[derive(Debug, Clone)]
pub struct CorrectionJob {
    pub text: String,
    pub api_key: String,
    pub model: Model,
}

#[derive(Debug, Clone)]
pub struct CheckJob {
    pub api_key: String,
    /// Corrections started before this check; see [`AppContext::on_check`].
    pub generation: u64,
}

/// Finished network work, delivered back to the UI thread.
#[derive(Debug)]
pub enum Outcome {
    Corrected(Result<String, CorrectionError>),
    Checked { generation: u64, result: Result<(), CorrectionError> },
}

/// Application state. Lives on the UI thread; every clipboard and status
/// mutation goes through here.
pub struct AppContext {
    status: StatusController,
    processing: bool,
    config: Config,
    config_path: PathBuf,
    bridge: ClipboardBridge,
    pending_restore: Option<PendingRestore>,
    settings_requested: bool,
    corrections: u64,
}

impl AppContext {
    pub fn new(
        config: Config,
        config_path: PathBuf,
        status: StatusController,
        bridge: ClipboardBridge,
    ) -> Self {
        let mut this = Self {
            status,
            processing: false,
            config,
            config_path,
            bridge,
            pending_restore: None,
            settings_requested: false,
            corrections: 0,
        };
        this.status.set_key_missing(!this.config.has_api_key());
        this.status.show_model(this.config.selected_model);
        this
    }

    pub fn status(&self) -> Status {
        self.status.status()
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn model(&self) -> Model {
        self.config.selected_model
    }

    pub fn api_key(&self) -> &str {
        &self.config.api_key
    }

    /// True once after something asked for the settings window.
    pub fn take_settings_request(&mut self) -> bool {
        std::mem::take(&mut self.settings_requested)
    }

    /// Hotkey pressed. Returns the request to send, if any.
    pub fn on_hotkey(&mut self) -> Option<CorrectionJob> {
        if self.processing {
            log::debug!("Hotkey ignored, correction already in flight");
            return None;
        }
        self.processing = true;
        self.corrections += 1;
        self.status.set_status(Status::Processing);

        // The capture snapshot must see the user's clipboard, not our last paste
        if let Some(pending) = self.pending_restore.take() {
            self.bridge.restore(pending);
        }

        let Some(text) = self.bridge.capture_selection() else {
            log::info!("Hotkey: nothing selected");
            self.processing = false;
            self.status.set_status(Status::Ok);
            return None;
        };

        log::info!("Correcting {} chars with {}", text.len(), self.config.selected_model);
        Some(CorrectionJob {
            text,
            api_key: self.config.api_key.clone(),
            model: self.config.selected_model,
        })
    }

    pub fn on_correction(&mut self, result: Result<String, CorrectionError>) {
        match result {
            Ok(corrected) => match self.bridge.replace_selection(&corrected) {
                Ok(pending) => {
                    log::info!("Correction applied ({} chars)", corrected.len());
                    self.pending_restore = Some(pending);
                    self.status.set_status(Status::Ok);
                }
                Err(e) => {
                    log::error!("Pasting correction failed: {}", e);
                    self.status.set_status(Status::Error);
                }
            },
            Err(CorrectionError::MissingCredential) => {
                log::warn!("Correction skipped: no API key");
                self.status.set_status(Status::Error);
                self.settings_requested = true;
            }
            Err(e) => {
                log::error!("Correction failed: {}", e);
                self.status.set_status(Status::Error);
            }
        }
        self.processing = false;
    }

    /// Status line clicked, app started or key committed.
    pub fn on_check_requested(&mut self) -> Option<CheckJob> {
        if self.processing {
            return None;
        }
        if !self.config.has_api_key() {
            self.status.set_status(Status::Error);
            return None;
        }
        Some(CheckJob { api_key: self.config.api_key.clone(), generation: self.corrections })
    }

    /// Applies a check result unless a correction started after the check
    /// was requested; that correction's status stands.
    pub fn on_check(&mut self, generation: u64, result: Result<(), CorrectionError>) {
        if self.processing || generation != self.corrections {
            log::debug!("Dropping stale API status result");
            return;
        }
        match result {
            Ok(()) => {
                log::info!("API status OK");
                self.status.set_status(Status::Ok);
            }
            Err(e) => {
                log::warn!("API status check failed: {}", e);
                self.status.set_status(Status::Error);
            }
        }
    }

    pub fn on_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Corrected(result) => self.on_correction(result),
            Outcome::Checked { generation, result } => self.on_check(generation, result),
        }
    }

    pub fn select_model(&mut self, model: Model) {
        self.config.selected_model = model;
        self.status.show_model(model);
        self.persist();
        log::info!("Model set to {}", model);
    }

    /// Called on every edit of the key field.
    pub fn set_api_key(&mut self, key: &str) {
        if self.config.api_key == key {
            return;
        }
        self.config.api_key = key.to_string();
        self.status.set_key_missing(!self.config.has_api_key());
        self.persist();
    }

    pub fn request_settings(&mut self) {
        self.settings_requested = true;
    }

    /// Puts the user's clipboard back once the paste had time to land.
    pub fn tick(&mut self, now: Instant) {
        if self.pending_restore.as_ref().is_some_and(|p| p.is_due(now)) {
            if let Some(pending) = self.pending_restore.take() {
                self.bridge.restore(pending);
            }
        }
    }

    pub fn has_pending_restore(&self) -> bool {
        self.pending_restore.is_some()
    }

    fn persist(&self) {
        if let Err(e) = self.config.save_to(&self.config_path) {
            log::error!("Saving settings failed: {:#}", e);
        }
    }
}
