//! Color constants and the light/dark palettes for the board.

use ratatui::style::Color;

use crate::fields::{Priority, Status, Theme};
use crate::notify::ToastKind;

/// Used for In Progress
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Used for Review
pub const DARK_PURPLE: Color = Color::Rgb(86, 60, 92);
/// Used for Done
pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);
/// Used for Urgent
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);

const SLATE: Color = Color::Rgb(30, 34, 42);
const PAPER: Color = Color::Rgb(245, 245, 240);

/// Colors for one theme.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub card: Color,
    pub accent: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Palette {
                background: PAPER,
                text: Color::Black,
                muted: Color::Gray,
                card: Color::White,
                accent: Color::Blue,
            },
            Theme::Dark => Palette {
                background: SLATE,
                text: Color::White,
                muted: Color::DarkGray,
                card: Color::DarkGray,
                accent: Color::Cyan,
            },
        }
    }

    /// Column border and header color.
    pub fn status(&self, status: Status) -> Color {
        match status {
            Status::Todo => self.accent,
            Status::InProgress => GOLD,
            Status::Review => DARK_PURPLE,
            Status::Done => DARK_GREEN,
        }
    }

    pub fn priority(&self, priority: Priority) -> Color {
        match priority {
            Priority::Low => self.muted,
            Priority::Medium => self.accent,
            Priority::High => GOLD,
            Priority::Urgent => DARK_RED,
        }
    }

    pub fn toast(&self, kind: ToastKind) -> Color {
        match kind {
            ToastKind::Success => DARK_GREEN,
            ToastKind::Error => DARK_RED,
            ToastKind::Info => self.accent,
            ToastKind::Warning => GOLD,
        }
    }

    /// Readable foreground on top of `bg`.
    pub fn text_on(&self, bg: Color) -> Color {
        match bg {
            GOLD | Color::Cyan | Color::White => Color::Rgb(20, 20, 20),
            _ => Color::White,
        }
    }
}
