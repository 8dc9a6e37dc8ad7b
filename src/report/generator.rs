//! Markdown report generation.
//!
//! This module generates Markdown and JSON estimate reports from
//! the comparables and the resulting estimate.

use crate::analysis::{format_currency, format_number};
use crate::models::{Estimate, Observation, Report, ReportMetadata};
use anyhow::Result;

/// Options controlling the Markdown output.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownOptions {
    pub include_comparables: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            include_comparables: true,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: MarkdownOptions) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Landhacker Price Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));

    if options.include_comparables {
        output.push_str(&generate_comparables_section(&report.comparables));
    }

    match report.estimate {
        Some(ref estimate) => output.push_str(&generate_estimate_section(estimate)),
        None => output.push_str(&generate_insufficient_section(
            report.insufficient_reason.as_deref(),
        )),
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Property:** {}\n", metadata.subject));
    if !metadata.locality.is_empty() {
        section.push_str(&format!("- **Locality:** {}\n", metadata.locality));
    }
    if let Some(ref zip) = metadata.zip_code {
        section.push_str(&format!("- **ZIP Code:** {}\n", zip));
    }
    if let Some(area) = metadata.target_area {
        section.push_str(&format!("- **Parcel Size:** {:.2} acres\n", area));
    }
    if let Some(ref distance) = metadata.distance {
        section.push_str(&format!(
            "- **Distance:** {} ({})\n",
            distance.distance_text, distance.duration_text
        ));
    }
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Comparables:** {}\n",
        metadata.comparables_count
    ));
    if let Some(ref id) = metadata.saved_query_id {
        section.push_str(&format!("- **Saved Query:** `{}`\n", id));
    }
    section.push('\n');

    section
}

/// Generate the comparables table.
fn generate_comparables_section(comparables: &[Observation]) -> String {
    let mut section = String::new();

    if comparables.is_empty() {
        section.push_str("## No Properties Found\n\n");
        section.push_str("Unable to find properties for sale nearby to estimate price.\n\n");
        return section;
    }

    section.push_str("## Comparable Properties\n\n");
    section.push_str("| Address | Size (Acres) | Price (USD) | Price/Acre |\n");
    section.push_str("|:---|---:|---:|---:|\n");

    for comp in comparables {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            comp.label.as_deref().unwrap_or("Unknown"),
            comp.area
                .map(|a| format_number(a, 3))
                .unwrap_or_else(|| "-".to_string()),
            comp.price
                .map(format_currency)
                .unwrap_or_else(|| "-".to_string()),
            comp.unit_price()
                .map(format_currency)
                .unwrap_or_else(|| "-".to_string()),
        ));
    }
    section.push('\n');

    section
}

/// Generate the predicted price section.
fn generate_estimate_section(estimate: &Estimate) -> String {
    let mut section = String::new();

    section.push_str("## Predicted Price\n\n");
    section.push_str(&format!(
        "**{}**\n\n",
        format_currency(estimate.projected_price)
    ));

    section.push_str("| Confidence | Price/Acre | Cluster | Outliers | Clusters |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {:.0}% | {} | {} of {} | {} | {} |\n\n",
        estimate.confidence,
        format_currency(estimate.mean_unit_price),
        estimate.cluster_size,
        estimate.total_valid,
        estimate.outliers,
        estimate.cluster_count,
    ));

    section.push_str("### Analysis\n\n");
    section.push_str(&estimate.narrative);
    section.push_str("\n\n");

    section
}

/// Generate the section shown when no estimate was produced.
fn generate_insufficient_section(reason: Option<&str>) -> String {
    let mut section = String::new();

    section.push_str("## Predicted Price\n\n");
    section.push_str("Not enough comparable data to estimate a price.\n\n");
    if let Some(reason) = reason {
        section.push_str(&format!("*{}*\n\n", reason));
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by Landhacker*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
