use crate::settings::Settings;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogKind {
    Info,
    Warning,
    Error,
}

/// Modal message box. Everything else waits until it is dismissed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dialog {
    pub kind: DialogKind,
    pub title: String,
    pub message: String,
}

impl Dialog {
    pub fn info(title: &str, message: impl Into<String>) -> Self {
        Self::new(DialogKind::Info, title, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(DialogKind::Warning, "Warning", message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DialogKind::Error, "Error", message)
    }

    fn new(kind: DialogKind, title: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsField {
    Theme,
    Background,
    Foreground,
    Accent,
    CustomBaud,
    AddBaud,
    Save,
}

impl SettingsField {
    pub const ALL: [SettingsField; 7] = [
        SettingsField::Theme,
        SettingsField::Background,
        SettingsField::Foreground,
        SettingsField::Accent,
        SettingsField::CustomBaud,
        SettingsField::AddBaud,
        SettingsField::Save,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SettingsField::Theme => "Select Theme",
            SettingsField::Background => "Background Color",
            SettingsField::Foreground => "Foreground Color",
            SettingsField::Accent => "Accent Color",
            SettingsField::CustomBaud => "Custom Baud",
            SettingsField::AddBaud => "Add Baud Rate",
            SettingsField::Save => "Save Settings",
        }
    }

    pub fn is_text(self) -> bool {
        matches!(
            self,
            SettingsField::Background
                | SettingsField::Foreground
                | SettingsField::Accent
                | SettingsField::CustomBaud
        )
    }
}

/// Edit buffers for the settings overlay. Colors are committed with Enter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingsDialog {
    pub field: usize,
    pub bg: String,
    pub fg: String,
    pub accent: String,
    pub custom_baud: String,
}

impl SettingsDialog {
    pub fn new(settings: &Settings) -> Self {
        Self {
            field: 0,
            bg: settings.custom_bg_color.clone(),
            fg: settings.custom_fg_color.clone(),
            accent: settings.custom_accent_color.clone(),
            custom_baud: String::new(),
        }
    }

    pub fn current(&self) -> SettingsField {
        SettingsField::ALL[self.field]
    }

    pub fn next(&mut self) {
        self.field = (self.field + 1) % SettingsField::ALL.len();
    }

    pub fn prev(&mut self) {
        self.field = (self.field + SettingsField::ALL.len() - 1) % SettingsField::ALL.len();
    }

    pub fn buffer(&self, field: SettingsField) -> Option<&str> {
        match field {
            SettingsField::Background => Some(&self.bg),
            SettingsField::Foreground => Some(&self.fg),
            SettingsField::Accent => Some(&self.accent),
            SettingsField::CustomBaud => Some(&self.custom_baud),
            _ => None,
        }
    }

    pub fn buffer_mut(&mut self) -> Option<&mut String> {
        match self.current() {
            SettingsField::Background => Some(&mut self.bg),
            SettingsField::Foreground => Some(&mut self.fg),
            SettingsField::Accent => Some(&mut self.accent),
            SettingsField::CustomBaud => Some(&mut self.custom_baud),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_cursor_wraps() {
        let mut dialog = SettingsDialog::new(&Settings::default());
        assert_eq!(dialog.current(), SettingsField::Theme);
        dialog.prev();
        assert_eq!(dialog.current(), SettingsField::Save);
        dialog.next();
        dialog.next();
        assert_eq!(dialog.current(), SettingsField::Background);
    }

    #[test]
    fn buffers_start_from_saved_colors() {
        let dialog = SettingsDialog::new(&Settings::default());
        assert_eq!(dialog.buffer(SettingsField::Foreground), Some("cyan"));
        assert_eq!(dialog.buffer(SettingsField::CustomBaud), Some(""));
        assert_eq!(dialog.buffer(SettingsField::Save), None);
    }
}
