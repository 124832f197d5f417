use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use copypasta::{ClipboardContext, ClipboardProvider};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::baud::{BaudRateError, BaudRates};
use crate::dialog::{Dialog, SettingsDialog, SettingsField};
use crate::monitor::Monitor;
use crate::serial::{Connector, SystemConnector};
use crate::settings::{Settings, Theme, SETTINGS_FILE};
use crate::theme::{parse_color, Palette};
use crate::ui;

const SCROLL_PAGE: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Ports,
    Bauds,
    Input,
    Output,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Ports => Focus::Bauds,
            Focus::Bauds => Focus::Input,
            Focus::Input => Focus::Output,
            Focus::Output => Focus::Ports,
        }
    }

    fn prev(self) -> Self {
        match self {
            Focus::Ports => Focus::Output,
            Focus::Bauds => Focus::Ports,
            Focus::Input => Focus::Bauds,
            Focus::Output => Focus::Input,
        }
    }
}

pub struct AppState {
    pub monitor: Monitor,
    pub settings: Settings,
    pub settings_path: PathBuf,
    pub palette: Palette,
    pub focus: Focus,
    pub port_cursor: Option<usize>,
    pub baud_cursor: usize,
    pub input_buffer: String,
    pub settings_dialog: Option<SettingsDialog>,
    pub dialog: Option<Dialog>,
}

impl AppState {
    pub fn new(connector: Box<dyn Connector>, settings_path: PathBuf) -> Self {
        let (settings, dialog) = match Settings::load(&settings_path) {
            Ok(settings) => (settings, None),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "settings not loaded");
                let message = format!("Failed to load settings: {e:#}");
                (Settings::default(), Some(Dialog::error(message)))
            }
        };
        let monitor = Monitor::new(
            connector,
            BaudRates::with_custom(&settings.custom_baud_rates),
        );
        let mut app = Self {
            monitor,
            palette: Palette::from_settings(&settings),
            settings,
            settings_path,
            focus: Focus::Ports,
            port_cursor: None,
            baud_cursor: 0,
            input_buffer: String::new(),
            settings_dialog: None,
            dialog,
        };
        app.sync_baud_cursor();
        app
    }

    pub fn show_error(&mut self, e: anyhow::Error) {
        let message = format!("{e:#}");
        tracing::warn!(error = %message, "operation failed");
        self.dialog = Some(Dialog::error(message));
    }

    fn populate_ports(&mut self) -> Result<()> {
        self.monitor
            .refresh_ports()
            .context("Failed to populate ports")?;
        self.port_cursor = match &self.monitor.selected_port {
            Some(name) => self.monitor.ports.iter().position(|p| &p.port_name == name),
            None => None,
        }
        .or(if self.monitor.ports.is_empty() {
            None
        } else {
            Some(0)
        });
        Ok(())
    }

    fn apply_theme(&mut self) {
        self.palette = Palette::from_settings(&self.settings);
        tracing::debug!(theme = ?self.settings.theme, "theme applied");
    }

    fn sync_baud_cursor(&mut self) {
        self.baud_cursor = self
            .monitor
            .baud_rates
            .position(self.monitor.baud_rate)
            .unwrap_or(0);
    }
}

pub fn run() -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let res = run_inner(&mut terminal);

    disable_raw_mode().ok();
    execute!(
        io::stdout(),
        terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    )
    .ok();
    terminal.show_cursor().ok();

    res
}

fn run_inner(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    let mut app = AppState::new(Box::new(SystemConnector), PathBuf::from(SETTINGS_FILE));
    if let Err(e) = app.populate_ports() {
        app.show_error(e);
    }

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, &app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match handle_key_event(&mut app, key) {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => app.show_error(e),
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            for message in app.monitor.drain_events() {
                app.dialog = Some(Dialog::error(message));
            }
            last_tick = Instant::now();
        }
    }

    app.monitor.disconnect();
    Ok(())
}

/// Returns `Ok(true)` when the user asked to quit.
pub fn handle_key_event(app: &mut AppState, key: KeyEvent) -> Result<bool> {
    if key.kind != KeyEventKind::Press {
        return Ok(false);
    }
    // AltGr arrives as Ctrl+Alt on Windows and produces ordinary characters
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL)
        && !key.modifiers.contains(KeyModifiers::ALT);
    if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
        return Ok(true);
    }

    if app.dialog.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            app.dialog = None;
        }
        return Ok(false);
    }

    if app.settings_dialog.is_some() {
        handle_settings_key(app, key)?;
        return Ok(false);
    }

    if ctrl {
        match key.code {
            KeyCode::Char('l') => app.monitor.clear(),
            KeyCode::Char('y') => copy_output(app)?,
            KeyCode::Char('a') => {
                app.monitor.toggle_auto_scroll();
            }
            KeyCode::Char('n') => app.monitor.append_nl = !app.monitor.append_nl,
            KeyCode::Char('r') => app.monitor.append_cr = !app.monitor.append_cr,
            KeyCode::Char('p') => app.populate_ports()?,
            _ => {}
        }
        return Ok(false);
    }

    match key.code {
        KeyCode::F(2) => open_settings(app),
        KeyCode::F(5) => app.monitor.reconnect().context("Failed to reconnect")?,
        KeyCode::F(6) => {
            app.monitor
                .toggle_pause()
                .context("Failed to pause/resume reading")?;
        }
        KeyCode::Tab => app.focus = app.focus.next(),
        KeyCode::BackTab => app.focus = app.focus.prev(),
        _ => match app.focus {
            Focus::Ports => match key.code {
                KeyCode::Up => move_port_cursor(app, -1),
                KeyCode::Down => move_port_cursor(app, 1),
                KeyCode::Enter => select_port(app)?,
                _ => {}
            },
            Focus::Bauds => match key.code {
                KeyCode::Up => move_baud_cursor(app, -1),
                KeyCode::Down => move_baud_cursor(app, 1),
                KeyCode::Enter => select_baud(app)?,
                _ => {}
            },
            Focus::Output => {
                let mut document = crate::output::lock(app.monitor.document());
                match key.code {
                    KeyCode::Up => document.scroll_up(1),
                    KeyCode::Down => document.scroll_down(1),
                    KeyCode::PageUp => document.scroll_up(SCROLL_PAGE),
                    KeyCode::PageDown => document.scroll_down(SCROLL_PAGE),
                    KeyCode::Home => document.scroll_to_top(),
                    KeyCode::End => document.scroll_to_bottom(),
                    _ => {}
                }
            }
            Focus::Input => match key.code {
                KeyCode::Enter => {
                    app.monitor
                        .send(&app.input_buffer)
                        .context("Failed to send")?;
                    app.input_buffer.clear();
                }
                KeyCode::Backspace => {
                    app.input_buffer.pop();
                }
                KeyCode::Char(c) => app.input_buffer.push(c),
                _ => {}
            },
        },
    }
    Ok(false)
}

fn move_port_cursor(app: &mut AppState, delta: isize) {
    if app.monitor.ports.is_empty() {
        app.port_cursor = None;
        return;
    }
    let last = app.monitor.ports.len() - 1;
    let current = app.port_cursor.unwrap_or(0);
    app.port_cursor = Some(current.saturating_add_signed(delta).min(last));
}

fn move_baud_cursor(app: &mut AppState, delta: isize) {
    let last = app.monitor.baud_rates.all().len() - 1;
    app.baud_cursor = app.baud_cursor.saturating_add_signed(delta).min(last);
}

fn select_port(app: &mut AppState) -> Result<()> {
    let idx = app.port_cursor.ok_or_else(|| anyhow!("no port selected"))?;
    let name = app
        .monitor
        .ports
        .get(idx)
        .map(|p| p.port_name.clone())
        .ok_or_else(|| anyhow!("invalid port index"))?;
    let res = app
        .monitor
        .select_port(&name)
        .context("Failed to handle selection change");
    app.sync_baud_cursor();
    res
}

fn select_baud(app: &mut AppState) -> Result<()> {
    let rate = app
        .monitor
        .baud_rates
        .all()
        .get(app.baud_cursor)
        .copied()
        .ok_or_else(|| anyhow!("Invalid baud rate selected."))?;
    app.monitor
        .select_baud(rate)
        .context("Failed to handle baud rate change")
}

fn copy_output(app: &mut AppState) -> Result<()> {
    let text = app.monitor.copy_text();
    let mut clipboard = ClipboardContext::new()
        .map_err(|e| anyhow!("Failed to copy output: clipboard unavailable: {e}"))?;
    clipboard
        .set_contents(text)
        .map_err(|e| anyhow!("Failed to copy output: {e}"))?;
    tracing::debug!("output copied to clipboard");
    Ok(())
}

fn open_settings(app: &mut AppState) {
    if app.settings_dialog.is_none() {
        app.settings_dialog = Some(SettingsDialog::new(&app.settings));
    }
}

fn handle_settings_key(app: &mut AppState, key: KeyEvent) -> Result<()> {
    let Some(dialog) = app.settings_dialog.as_mut() else {
        return Ok(());
    };
    let field = dialog.current();

    match key.code {
        KeyCode::Esc => app.settings_dialog = None,
        KeyCode::Up | KeyCode::BackTab => dialog.prev(),
        KeyCode::Down | KeyCode::Tab => dialog.next(),
        KeyCode::Left if field == SettingsField::Theme => cycle_theme(app, -1),
        KeyCode::Right if field == SettingsField::Theme => cycle_theme(app, 1),
        KeyCode::Backspace => {
            if let Some(buffer) = dialog.buffer_mut() {
                buffer.pop();
            }
        }
        KeyCode::Char(c) if field.is_text() => {
            if let Some(buffer) = dialog.buffer_mut() {
                buffer.push(c);
            }
        }
        KeyCode::Enter => match field {
            SettingsField::Theme => cycle_theme(app, 1),
            SettingsField::Background | SettingsField::Foreground | SettingsField::Accent => {
                commit_color(app, field)?
            }
            SettingsField::CustomBaud | SettingsField::AddBaud => add_custom_baud_rate(app),
            SettingsField::Save => save_settings(app)?,
        },
        _ => {}
    }
    Ok(())
}

fn cycle_theme(app: &mut AppState, delta: isize) {
    let len = Theme::ALL.len() as isize;
    let idx = Theme::ALL
        .iter()
        .position(|t| *t == app.settings.theme)
        .unwrap_or(0) as isize;
    app.settings.theme = Theme::ALL[(idx + delta).rem_euclid(len) as usize];
    app.apply_theme();
}

fn commit_color(app: &mut AppState, field: SettingsField) -> Result<()> {
    let text = app
        .settings_dialog
        .as_ref()
        .and_then(|d| d.buffer(field))
        .unwrap_or_default()
        .trim()
        .to_string();
    if parse_color(&text).is_none() {
        return Err(anyhow!(
            "Failed to select {}: '{text}' is not a color, use #rrggbb or a color name",
            field.label().to_lowercase()
        ));
    }
    let slot = match field {
        SettingsField::Background => &mut app.settings.custom_bg_color,
        SettingsField::Foreground => &mut app.settings.custom_fg_color,
        _ => &mut app.settings.custom_accent_color,
    };
    *slot = text;
    app.apply_theme();
    Ok(())
}

fn add_custom_baud_rate(app: &mut AppState) {
    let Some(dialog) = app.settings_dialog.as_mut() else {
        return;
    };
    app.dialog = Some(match app.monitor.baud_rates.add_custom(&dialog.custom_baud) {
        Ok(rate) => {
            dialog.custom_baud.clear();
            Dialog::info("Success", format!("Custom baud rate {rate} added."))
        }
        Err(e @ BaudRateError::Duplicate(_)) => Dialog::warning(e.to_string()),
        Err(e @ BaudRateError::Invalid(_)) => Dialog::error(e.to_string()),
    });
}

fn save_settings(app: &mut AppState) -> Result<()> {
    app.settings.custom_baud_rates = app.monitor.baud_rates.custom().to_vec();
    app.settings
        .save(&app.settings_path)
        .context("Failed to save settings")?;
    app.dialog = Some(Dialog::info("Settings", "Settings saved successfully!"));
    Ok(())
}
