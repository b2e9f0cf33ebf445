//! Status icons for CLI output

/// Status icons for different states
pub struct StatusIcon;

impl StatusIcon {
    /// Applied
    pub const SUCCESS: &'static str = "✓";

    /// Retryable failure
    pub const WARNING: &'static str = "⚠";

    /// Permanent failure
    pub const ERROR: &'static str = "✗";

    /// Cancelled before an answer arrived
    pub const UNKNOWN: &'static str = "?";

    /// Get icon for a failure class from `KubeError::kind`
    pub fn get_failure_icon(kind: &str) -> &'static str {
        match kind {
            "Transport" | "Timeout" | "DiscoveryFailed" => Self::WARNING,
            "Cancelled" => Self::UNKNOWN,
            _ => Self::ERROR,
        }
    }

    /// Get scope text for a resource type
    pub fn get_scope_text(namespaced: bool) -> &'static str {
        if namespaced {
            "Namespaced"
        } else {
            "Cluster"
        }
    }
}
