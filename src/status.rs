use crate::config::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    Processing,
}

/// Which tray icon to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Pencil,
    Warning,
    Ellipsis,
}

impl Status {
    pub fn glyph(self) -> Glyph {
        match self {
            Status::Ok => Glyph::Pencil,
            Status::Error => Glyph::Warning,
            Status::Processing => Glyph::Ellipsis,
        }
    }

    pub fn menu_title(self, key_missing: bool) -> &'static str {
        match self {
            Status::Ok => "API Status: OK",
            Status::Processing => "API Status: Processing...",
            Status::Error if key_missing => "API Status: Error - API Key Missing",
            Status::Error => "API Status: Error - Click to retry",
        }
    }
}

/// Where status changes are mirrored. The tray implements it; tests record.
pub trait StatusSink {
    fn show_status(&mut self, status: Status, glyph: Glyph, title: &str);
    fn show_model(&mut self, model: Model);
}

pub struct StatusController {
    status: Status,
    key_missing: bool,
    sink: Box<dyn StatusSink>,
}

impl StatusController {
    pub fn new(sink: Box<dyn StatusSink>, key_missing: bool) -> Self {
        let mut this = Self { status: Status::Ok, key_missing, sink };
        this.refresh();
        this
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status) {
        if status != self.status {
            log::debug!("Status {:?} -> {:?}", self.status, status);
        }
        self.status = status;
        self.refresh();
    }

    /// The error title depends on whether a key is stored.
    pub fn set_key_missing(&mut self, missing: bool) {
        if missing != self.key_missing {
            self.key_missing = missing;
            self.refresh();
        }
    }

    pub fn show_model(&mut self, model: Model) {
        self.sink.show_model(model);
    }

    fn refresh(&mut self) {
        let title = self.status.menu_title(self.key_missing);
        self.sink.show_status(self.status, self.status.glyph(), title);
    }
}
