//! Pass/fail coverage badges.

use quick_xml::escape::escape;
use serde::Serialize;

pub const PASS_COLOR: &str = "#4c1";
pub const FAIL_COLOR: &str = "#e05d44";
pub const LABEL: &str = "coverage";
pub const LABEL_WIDTH: u32 = 61;
/// Shown instead of a percentage when there is no coverage data.
pub const NO_DATA: &str = "new";

const LABEL_COLOR: &str = "#555";
const CHAR_WIDTH: u32 = 7;
const PADDING: u32 = 10;

/// The semantic fields of a badge, ready for an image renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeRequest {
    pub background_color: String,
    pub label: String,
    pub value: String,
    pub label_width: u32,
}

impl BadgeRequest {
    pub fn passed(&self) -> bool {
        self.background_color == PASS_COLOR
    }

    /// Render a flat two-segment SVG badge.
    pub fn to_svg(&self) -> String {
        let value_width = self.value.chars().count() as u32 * CHAR_WIDTH + PADDING;
        let total = self.label_width + value_width;
        let label_x = self.label_width / 2;
        let value_x = self.label_width + value_width / 2;
        let label = escape(self.label.as_str());
        let value = escape(self.value.as_str());
        let color = escape(self.background_color.as_str());

        format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{total}" height="20" role="img" aria-label="{label}: {value}"><linearGradient id="s" x2="0" y2="100%"><stop offset="0" stop-color="#bbb" stop-opacity=".1"/><stop offset="1" stop-opacity=".1"/></linearGradient><rect width="{lw}" height="20" fill="{LABEL_COLOR}"/><rect x="{lw}" width="{value_width}" height="20" fill="{color}"/><rect width="{total}" height="20" fill="url(#s)"/><g fill="#fff" text-anchor="middle" font-family="Verdana,Geneva,DejaVu Sans,sans-serif" font-size="11"><text x="{label_x}" y="14">{label}</text><text x="{value_x}" y="14">{value}</text></g></svg>"##,
            lw = self.label_width,
        )
    }
}

/// Build the badge for `percent` against `pass_threshold`.
///
/// A missing percent shows [`NO_DATA`] and takes the fail color.
pub fn badge_request(percent: Option<f64>, pass_threshold: f64) -> BadgeRequest {
    let passed = percent.is_some_and(|p| p >= pass_threshold);
    BadgeRequest {
        background_color: if passed { PASS_COLOR } else { FAIL_COLOR }.to_string(),
        label: LABEL.to_string(),
        value: display_value(percent),
        label_width: LABEL_WIDTH,
    }
}

/// Percentage floored to an integer with a trailing `%`, or [`NO_DATA`].
pub fn display_value(percent: Option<f64>) -> String {
    match percent {
        Some(p) => format!("{}%", p.floor() as i64),
        None => NO_DATA.to_string(),
    }
}
