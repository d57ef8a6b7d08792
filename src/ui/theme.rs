/// Color themes for the deck
use ratatui::style::Color;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub name: &'static str,
    /// Cassette shell and borders
    pub shell: Color,
    pub label: Color,
    pub reel: Color,
    /// Visualizer bars
    pub accent: Color,
    pub background: Color,
    pub foreground: Color,
    pub muted: Color,
    pub error: Color,
    pub success: Color,
}

impl Theme {
    pub fn vintage() -> Self {
        Self {
            name: "vintage",
            shell: Color::Rgb(139, 90, 43),
            label: Color::Rgb(245, 222, 179),
            reel: Color::Rgb(210, 180, 140),
            accent: Color::Rgb(255, 140, 0),
            background: Color::Rgb(40, 26, 13),
            foreground: Color::Rgb(250, 235, 215),
            muted: Color::Rgb(160, 130, 100),
            error: Color::Rgb(220, 60, 40),
            success: Color::Rgb(120, 170, 60),
        }
    }

    pub fn dark() -> Self {
        Self {
            name: "dark",
            shell: Color::DarkGray,
            label: Color::White,
            reel: Color::Gray,
            accent: Color::Cyan,
            background: Color::Black,
            foreground: Color::White,
            muted: Color::DarkGray,
            error: Color::Red,
            success: Color::Green,
        }
    }

    pub fn light() -> Self {
        Self {
            name: "light",
            shell: Color::Gray,
            label: Color::Black,
            reel: Color::DarkGray,
            accent: Color::Blue,
            background: Color::White,
            foreground: Color::Black,
            muted: Color::Gray,
            error: Color::Red,
            success: Color::Green,
        }
    }

    /// Look up a theme by name, falling back to vintage
    pub fn named(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "vintage" => Self::vintage(),
            "dark" => Self::dark(),
            "light" => Self::light(),
            other => {
                tracing::warn!("Unknown theme '{}', using vintage", other);
                Self::vintage()
            }
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::vintage()
    }
}
