//! Color theme for CLI output

use comfy_table::Color as TableColor;

/// Color theme for terminal output
#[derive(Debug, Clone)]
pub struct ColorTheme {
    pub success: TableColor,
    pub warning: TableColor,
    pub error: TableColor,
    pub info: TableColor,
    pub muted: TableColor,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: TableColor::Green,
            warning: TableColor::Yellow,
            error: TableColor::Red,
            info: TableColor::Cyan,
            muted: TableColor::DarkGrey,
        }
    }
}

impl ColorTheme {
    /// Get color based on the HTTP status of an apply
    pub fn get_status_color(&self, http_status: u16) -> TableColor {
        match http_status {
            200 => self.success,
            201 => self.info,
            0 => self.muted,
            _ => self.warning,
        }
    }

    /// Get color for a failure class from `KubeError::kind`
    pub fn get_failure_color(&self, kind: &str) -> TableColor {
        match kind {
            "Transport" | "Timeout" | "DiscoveryFailed" => self.warning,
            "Cancelled" => self.muted,
            _ => self.error,
        }
    }
}
