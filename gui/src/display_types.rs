use std::fmt;

use iced::Color;
use savemgr_engine::DiagnosticTag;

pub const STATUS_COLOR: Color = Color::from_rgb(1.0, 140.0 / 255.0, 0.0);
pub const SPEED_COLOR: Color = Color::from_rgb(0.0, 1.0, 0.0);

/// Alternating colors for the numbered list of found folders
pub const FOUND_COLORS: [Color; 2] = [
    Color::from_rgb(0.0, 140.0 / 255.0, 139.0 / 255.0),
    Color::from_rgb(1.0, 140.0 / 255.0, 0.0),
];

pub fn tag_color(tag: DiagnosticTag) -> Color {
    match tag {
        DiagnosticTag::Skip => Color::from_rgb(139.0 / 255.0, 140.0 / 255.0, 0.0),
        DiagnosticTag::Ignore => Color::from_rgb(0.5, 0.5, 0.5),
        DiagnosticTag::Copy => Color::from_rgb(0.0, 140.0 / 255.0, 139.0 / 255.0),
        DiagnosticTag::Delete => Color::from_rgb(1.0, 140.0 / 255.0, 0.0),
        DiagnosticTag::Error => Color::from_rgb(229.0 / 255.0, 57.0 / 255.0, 53.0 / 255.0),
    }
}

/// Which diagnostics the copy log shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFilter {
    #[default]
    All,
    Only(DiagnosticTag),
}

impl LogFilter {
    pub fn options() -> Vec<LogFilter> {
        std::iter::once(LogFilter::All)
            .chain(DiagnosticTag::ALL.iter().copied().map(LogFilter::Only))
            .collect()
    }

    pub fn accepts(&self, tag: DiagnosticTag) -> bool {
        match self {
            LogFilter::All => true,
            LogFilter::Only(only) => *only == tag,
        }
    }
}

impl fmt::Display for LogFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFilter::All => write!(f, "All"),
            LogFilter::Only(DiagnosticTag::Skip) => write!(f, "Skipped"),
            LogFilter::Only(DiagnosticTag::Ignore) => write!(f, "Ignored"),
            LogFilter::Only(DiagnosticTag::Copy) => write!(f, "Copied"),
            LogFilter::Only(DiagnosticTag::Delete) => write!(f, "Deleted"),
            LogFilter::Only(DiagnosticTag::Error) => write!(f, "Errors"),
        }
    }
}
