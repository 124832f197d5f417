use ratatui::style::Color;

use crate::settings::{Settings, Theme};

const LIGHT_ACCENT: Color = Color::Rgb(0x00, 0xb3, 0xb3);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub bg: Color,
    pub fg: Color,
    pub accent: Color,
}

impl Palette {
    pub const DARK: Palette = Palette {
        bg: Color::Rgb(0x00, 0x00, 0x00),
        fg: Color::Rgb(0x00, 0xff, 0xff),
        accent: Color::Rgb(0x00, 0x80, 0x80),
    };

    pub const LIGHT: Palette = Palette {
        bg: Color::Rgb(0xff, 0xff, 0xff),
        fg: Color::Rgb(0x00, 0x00, 0x00),
        accent: LIGHT_ACCENT,
    };

    pub fn from_settings(settings: &Settings) -> Self {
        match settings.theme {
            Theme::Dark => Self::DARK,
            Theme::Light => Self::LIGHT,
            Theme::Custom => Self {
                bg: parse_color(&settings.custom_bg_color).unwrap_or(Self::DARK.bg),
                fg: parse_color(&settings.custom_fg_color).unwrap_or(Self::DARK.fg),
                accent: parse_color(&settings.custom_accent_color).unwrap_or(Self::DARK.accent),
            },
        }
    }

    /// Readable text color on top of the accent.
    pub fn on_accent(&self) -> Color {
        match self.accent {
            Color::Rgb(r, g, b) if luminance(r, g, b) > 160 => Color::Rgb(0, 0, 0),
            _ => Color::Rgb(0xff, 0xff, 0xff),
        }
    }
}

fn luminance(r: u8, g: u8, b: u8) -> u32 {
    (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000
}

/// Accepts `#rrggbb` or a small set of web color names.
pub fn parse_color(text: &str) -> Option<Color> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix('#') {
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?));
    }

    let rgb = match text.to_ascii_lowercase().as_str() {
        "black" => (0x00, 0x00, 0x00),
        "white" => (0xff, 0xff, 0xff),
        "red" => (0xff, 0x00, 0x00),
        "green" => (0x00, 0x80, 0x00),
        "lime" => (0x00, 0xff, 0x00),
        "blue" => (0x00, 0x00, 0xff),
        "navy" => (0x00, 0x00, 0x80),
        "yellow" => (0xff, 0xff, 0x00),
        "olive" => (0x80, 0x80, 0x00),
        "cyan" | "aqua" => (0x00, 0xff, 0xff),
        "teal" => (0x00, 0x80, 0x80),
        "magenta" | "fuchsia" => (0xff, 0x00, 0xff),
        "purple" => (0x80, 0x00, 0x80),
        "maroon" => (0x80, 0x00, 0x00),
        "gray" | "grey" => (0x80, 0x80, 0x80),
        "silver" => (0xc0, 0xc0, 0xc0),
        "orange" => (0xff, 0xa5, 0x00),
        _ => return None,
    };
    Some(Color::Rgb(rgb.0, rgb.1, rgb.2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_names() {
        assert_eq!(parse_color("#00b3b3"), Some(LIGHT_ACCENT));
        assert_eq!(parse_color("#00B3B3"), Some(LIGHT_ACCENT));
        assert_eq!(parse_color(" Teal "), Some(Color::Rgb(0, 0x80, 0x80)));
        assert_eq!(parse_color("grey"), parse_color("gray"));
    }

    #[test]
    fn rejects_malformed_colors() {
        for text in ["", "#fff", "#gg0000", "#1234567", "chartreuse", "ff0000"] {
            assert_eq!(parse_color(text), None, "{text:?}");
        }
    }

    #[test]
    fn builtin_themes_ignore_custom_colors() {
        let mut settings = Settings {
            custom_bg_color: "#123456".to_string(),
            ..Settings::default()
        };
        assert_eq!(Palette::from_settings(&settings), Palette::DARK);
        settings.theme = Theme::Light;
        assert_eq!(Palette::from_settings(&settings), Palette::LIGHT);
    }

    #[test]
    fn custom_theme_uses_custom_colors_with_fallback() {
        let settings = Settings {
            theme: Theme::Custom,
            custom_bg_color: "#123456".to_string(),
            custom_fg_color: "not a color".to_string(),
            custom_accent_color: "orange".to_string(),
            ..Settings::default()
        };
        let palette = Palette::from_settings(&settings);
        assert_eq!(palette.bg, Color::Rgb(0x12, 0x34, 0x56));
        assert_eq!(palette.fg, Palette::DARK.fg);
        assert_eq!(palette.accent, Color::Rgb(0xff, 0xa5, 0x00));
    }

    #[test]
    fn accent_text_contrasts() {
        assert_eq!(Palette::DARK.on_accent(), Color::Rgb(0xff, 0xff, 0xff));
        let bright = Palette {
            accent: Color::Rgb(0xff, 0xff, 0x00),
            ..Palette::DARK
        };
        assert_eq!(bright.on_accent(), Color::Rgb(0, 0, 0));
    }
}
