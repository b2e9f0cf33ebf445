//! Table rendering for CLI output

use super::{ColorTheme, StatusIcon};
use crate::domain::apply::ApplyResult;
use crate::domain::resource::ResourceCoordinate;
use crate::shared::error::ErrorReport;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};

/// Table renderer for formatted output
pub struct TableRenderer {
    theme: ColorTheme,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRenderer {
    /// Create a new table renderer with default theme
    pub fn new() -> Self {
        Self {
            theme: ColorTheme::default(),
        }
    }

    /// Render applied resources as a formatted table
    pub fn render_apply_results(&self, results: &[ApplyResult], field_manager: &str) -> String {
        if results.is_empty() {
            return "No manifests to apply".to_string();
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("KIND").set_alignment(CellAlignment::Left),
                Cell::new("NAMESPACE").set_alignment(CellAlignment::Left),
                Cell::new("NAME").set_alignment(CellAlignment::Left),
                Cell::new("RESOURCE").set_alignment(CellAlignment::Left),
                Cell::new("STATUS").set_alignment(CellAlignment::Center),
            ]);

        for result in results {
            let namespace = result.resource.namespace.as_deref().unwrap_or("-");
            table.add_row(vec![
                Cell::new(&result.resource.kind),
                Cell::new(namespace),
                Cell::new(&result.resource.name),
                Cell::new(format!(
                    "{}/{}",
                    result.coordinate.api_version(),
                    result.coordinate.plural
                )),
                Cell::new(format!("{} {}", StatusIcon::SUCCESS, result.http_status))
                    .fg(self.theme.get_status_color(result.http_status)),
            ]);
        }

        let mut output = String::new();
        output.push_str(&format!(
            "╭─ Applied as {} {} ─╮\n",
            field_manager,
            format!("[{} resources]", results.len()).bright_black()
        ));
        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    /// Render a resolved resource type
    pub fn render_coordinate(&self, coordinate: &ResourceCoordinate) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("FIELD").set_alignment(CellAlignment::Left),
                Cell::new("VALUE").set_alignment(CellAlignment::Left),
            ]);

        let group = if coordinate.group.is_empty() {
            "(core)"
        } else {
            coordinate.group.as_str()
        };
        table.add_row(vec![Cell::new("Kind"), Cell::new(&coordinate.kind)]);
        table.add_row(vec![Cell::new("Group"), Cell::new(group)]);
        table.add_row(vec![Cell::new("Version"), Cell::new(&coordinate.version)]);
        table.add_row(vec![
            Cell::new("Plural"),
            Cell::new(&coordinate.plural).fg(self.theme.info),
        ]);
        table.add_row(vec![
            Cell::new("Scope"),
            Cell::new(StatusIcon::get_scope_text(coordinate.namespaced)),
        ]);
        let path = coordinate.object_path("<name>", coordinate.namespaced.then_some("<namespace>"));
        table.add_row(vec![Cell::new("Path"), Cell::new(path).fg(self.theme.muted)]);

        table.to_string()
    }

    /// Render a failure with its resource and server details
    pub fn render_failure(&self, report: &ErrorReport) -> String {
        let icon = StatusIcon::get_failure_icon(report.kind);
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.add_row(vec![Cell::new(format!("{} {}", icon, report.kind))
            .fg(self.theme.get_failure_color(report.kind))
            .set_alignment(CellAlignment::Left)]);
        if let Some(resource) = &report.resource {
            table.add_row(vec![Cell::new(format!("Resource: {}", resource))]);
        }
        table.add_row(vec![Cell::new(&report.message)]);
        if let Some(body) = &report.body {
            table.add_row(vec![Cell::new(body.to_string()).fg(self.theme.muted)]);
        }

        table.to_string()
    }
}
