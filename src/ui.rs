use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::*;
use unicode_width::UnicodeWidthStr;

use crate::app::{AppState, Focus};
use crate::dialog::{Dialog, DialogKind, SettingsDialog, SettingsField};
use crate::monitor::ReadState;
use crate::output;
use crate::settings::Theme;
use crate::theme::{parse_color, Palette};

const PLACEHOLDER: &str = "Type here to send...";

pub fn draw(frame: &mut Frame, app: &AppState) {
    let palette = app.palette;
    frame.render_widget(Block::default().style(base(&palette)), frame.size());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(3),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(frame.size());

    draw_header(frame, chunks[0], app);
    draw_body(frame, chunks[1], app);
    draw_input(frame, chunks[2], app);
    draw_buttons(frame, chunks[3], app);

    if let Some(dialog) = &app.settings_dialog {
        draw_settings(frame, dialog, app);
    }
    if let Some(dialog) = &app.dialog {
        draw_dialog(frame, dialog, &palette);
    }
}

fn base(palette: &Palette) -> Style {
    Style::default().bg(palette.bg).fg(palette.fg)
}

fn button(palette: &Palette) -> Style {
    Style::default()
        .bg(palette.accent)
        .fg(palette.on_accent())
        .add_modifier(Modifier::BOLD)
}

fn pane<'a>(title: &'a str, focused: bool, palette: &Palette) -> Block<'a> {
    let border = if focused {
        Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(palette.fg)
    };
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(border)
        .style(base(palette))
}

fn draw_header(frame: &mut Frame, area: Rect, app: &AppState) {
    let palette = &app.palette;
    let mut spans: Vec<Span> = Vec::new();
    spans.push(Span::styled(" Serial Monitor ", button(palette)));
    spans.push(Span::raw("  Tab:focus  Enter:select  F2:settings  ^Q:quit "));
    spans.push(Span::styled(
        format!(" [baud:{}] ", app.monitor.baud_rate),
        Style::default().fg(Color::Yellow),
    ));
    if let Some(port) = &app.monitor.selected_port {
        spans.push(Span::styled(
            format!(" port:{port} "),
            Style::default().fg(Color::Green),
        ));
    }
    let (label, bg) = match (app.monitor.connection(), app.monitor.read_state()) {
        (None, _) => (" CLOSED ".to_string(), Color::Red),
        (Some(conn), ReadState::Paused) => (
            format!(" PAUSED {}@{} ", conn.port_name(), conn.baud_rate()),
            Color::Yellow,
        ),
        (Some(conn), ReadState::Reading) => (
            format!(" OPEN {}@{} ", conn.port_name(), conn.baud_rate()),
            Color::Green,
        ),
    };
    spans.push(Span::styled(label, Style::default().fg(Color::Black).bg(bg)));

    let p = Paragraph::new(Text::from(Line::from(spans))).block(pane("Help", false, palette));
    frame.render_widget(p, area);
}

fn draw_body(frame: &mut Frame, area: Rect, app: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25), Constraint::Percentage(75)].as_ref())
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(chunks[0]);

    draw_ports(frame, left[0], app);
    draw_bauds(frame, left[1], app);
    draw_output(frame, chunks[1], app);
}

fn draw_ports(frame: &mut Frame, area: Rect, app: &AppState) {
    let palette = &app.palette;
    let items: Vec<ListItem> = app
        .monitor
        .ports
        .iter()
        .map(|p| {
            let mut line = vec![Span::raw(p.port_name.as_str())];
            if let serialport::SerialPortType::UsbPort(info) = &p.port_type {
                let tail = format!(
                    "  {} {}",
                    info.manufacturer.clone().unwrap_or_default(),
                    info.product.clone().unwrap_or_default(),
                );
                line.push(Span::styled(tail, Style::default().fg(Color::DarkGray)));
            }
            ListItem::new(Line::from(line))
        })
        .collect();

    let list = List::new(items)
        .block(pane("Select Port", app.focus == Focus::Ports, palette))
        .highlight_style(Style::default().bg(palette.accent).fg(palette.on_accent()))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.port_cursor);
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_bauds(frame: &mut Frame, area: Rect, app: &AppState) {
    let palette = &app.palette;
    let items: Vec<ListItem> = app
        .monitor
        .baud_rates
        .all()
        .into_iter()
        .map(|rate| {
            let marker = if rate == app.monitor.baud_rate { "* " } else { "  " };
            ListItem::new(format!("{marker}{rate}"))
        })
        .collect();

    let list = List::new(items)
        .block(pane("Select Baud Rate", app.focus == Focus::Bauds, palette))
        .highlight_style(Style::default().bg(palette.accent).fg(palette.on_accent()))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(app.baud_cursor));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_output(frame: &mut Frame, area: Rect, app: &AppState) {
    let mut document = output::lock(app.monitor.document());
    // inside the borders
    document.set_viewport(
        area.height.saturating_sub(2) as usize,
        area.width.saturating_sub(2) as usize,
    );
    let title = if document.scroll_back() > 0 {
        format!(
            "Output [{} lines, +{}]",
            document.line_count(),
            document.scroll_back()
        )
    } else {
        format!("Output [{} lines]", document.line_count())
    };

    let text: Vec<Line> = if document.is_empty() && !app.monitor.is_connected() {
        vec![Line::from(Span::styled(
            "Select a port and press Enter to connect.",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        document
            .window()
            .into_iter()
            .map(|row| Line::from(Span::raw(row.to_string())))
            .collect()
    };
    drop(document);

    // rows arrive already wrapped to the pane width
    let p = Paragraph::new(Text::from(text)).block(pane(
        &title,
        app.focus == Focus::Output,
        &app.palette,
    ));
    frame.render_widget(p, area);
}

fn draw_input(frame: &mut Frame, area: Rect, app: &AppState) {
    let palette = &app.palette;
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(14)].as_ref())
        .split(area);

    let focused = app.focus == Focus::Input;
    let p = if app.input_buffer.is_empty() && !focused {
        Paragraph::new(Span::styled(PLACEHOLDER, Style::default().fg(Color::DarkGray)))
    } else {
        Paragraph::new(app.input_buffer.as_str())
    };
    frame.render_widget(p.block(pane("Input", focused, palette)), chunks[0]);

    let toggle = |label: &'static str, on: bool| {
        if on {
            Span::styled(label, button(palette))
        } else {
            Span::styled(label, Style::default().fg(palette.accent))
        }
    };
    let toggles = Line::from(vec![
        toggle(" NL ", app.monitor.append_nl),
        Span::raw(" "),
        toggle(" CR ", app.monitor.append_cr),
    ]);
    let p = Paragraph::new(toggles)
        .alignment(Alignment::Center)
        .block(pane("^N ^R", false, palette));
    frame.render_widget(p, chunks[1]);

    if focused && app.settings_dialog.is_none() && app.dialog.is_none() {
        let x = chunks[0].x + 1 + app.input_buffer.width() as u16;
        let y = chunks[0].y + 1;
        frame.set_cursor(x, y);
    }
}

fn draw_buttons(frame: &mut Frame, area: Rect, app: &AppState) {
    let palette = &app.palette;
    let pause = match app.monitor.read_state() {
        ReadState::Reading => " F6 Pause ",
        ReadState::Paused => " F6 Resume ",
    };
    let auto_scroll = output::lock(app.monitor.document()).auto_scroll();
    let auto_scroll_style = if auto_scroll {
        button(palette)
    } else {
        Style::default().fg(palette.accent)
    };

    let mut spans = Vec::new();
    for (label, style) in [
        (" F5 Reconnect ", button(palette)),
        (pause, button(palette)),
        (" ^L Clear ", button(palette)),
        (" ^Y Copy Output ", button(palette)),
        (" ^A Auto Scroll ", auto_scroll_style),
        (" F2 Settings ", button(palette)),
    ] {
        spans.push(Span::styled(label, style));
        spans.push(Span::raw(" "));
    }

    let p = Paragraph::new(Line::from(spans)).block(pane("Actions", false, palette));
    frame.render_widget(p, area);
}

fn draw_settings(frame: &mut Frame, dialog: &SettingsDialog, app: &AppState) {
    let palette = &app.palette;
    let area = centered_rect(56, 14, frame.size());
    let mut lines = Vec::new();

    for (i, field) in SettingsField::ALL.iter().copied().enumerate() {
        let selected = i == dialog.field;
        let cursor = if selected { "> " } else { "  " };
        let label_style = if selected {
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
        } else {
            base(palette)
        };

        let mut spans = vec![Span::styled(cursor, label_style)];
        match field {
            SettingsField::Theme => {
                spans.push(Span::styled(format!("{}: ", field.label()), label_style));
                for theme in Theme::ALL {
                    let mark = if theme == app.settings.theme { "(*)" } else { "( )" };
                    spans.push(Span::raw(format!("{mark} {theme}  ")));
                }
            }
            SettingsField::Background | SettingsField::Foreground | SettingsField::Accent => {
                let value = dialog.buffer(field).unwrap_or_default();
                spans.push(Span::styled(format!("{}: ", field.label()), label_style));
                spans.push(Span::raw(format!("[{value}] ")));
                if let Some(color) = parse_color(value) {
                    spans.push(Span::styled("  ", Style::default().bg(color)));
                }
            }
            SettingsField::CustomBaud => {
                let value = dialog.buffer(field).unwrap_or_default();
                spans.push(Span::styled(format!("{}: ", field.label()), label_style));
                if value.is_empty() && !selected {
                    spans.push(Span::styled("[...]", Style::default().fg(Color::DarkGray)));
                } else {
                    spans.push(Span::raw(format!("[{value}]")));
                }
            }
            SettingsField::AddBaud | SettingsField::Save => {
                spans.push(Span::styled(format!(" {} ", field.label()), button(palette)));
            }
        }
        lines.push(Line::from(spans));
        if matches!(field, SettingsField::Theme | SettingsField::Accent | SettingsField::AddBaud) {
            lines.push(Line::from(""));
        }
    }
    lines.push(Line::from(Span::styled(
        "Up/Down:field  Left/Right:theme  Enter:apply  Esc:close",
        Style::default().fg(Color::DarkGray),
    )));

    let p = Paragraph::new(Text::from(lines)).block(pane("Settings", true, palette));
    frame.render_widget(Clear, area);
    frame.render_widget(p, area);
}

fn draw_dialog(frame: &mut Frame, dialog: &Dialog, palette: &Palette) {
    let area = centered_rect(50, 8, frame.size());
    let title_color = match dialog.kind {
        DialogKind::Info => palette.accent,
        DialogKind::Warning => Color::Yellow,
        DialogKind::Error => Color::Red,
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {} ", dialog.title),
            Style::default().fg(title_color).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(title_color))
        .style(base(palette));

    let text = Text::from(vec![
        Line::from(dialog.message.as_str()),
        Line::from(""),
        Line::from(Span::styled(" OK ", button(palette))),
    ]);
    let p = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block);
    frame.render_widget(Clear, area);
    frame.render_widget(p, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
