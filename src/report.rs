//! Human readable renderings of reports and datasets.

use dicom_core::{Tag, VR};

use crate::dataset::Dataset;
use crate::element::{DataElement, ElementValue};
use crate::rules::RuleId;
use crate::validator::Report;

const VR_ISSUES_HEADING: &str = "   - found binary/unknown VRs that might cause issues:";

/// How much of a report or dataset the text renderings show.
///
/// Limits only affect presentation, a [`Report`] always keeps every finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayLimits {
    pub max_vr_issues: usize,
    pub max_elements: usize,
    pub max_value_chars: usize,
}

impl Default for DisplayLimits {
    fn default() -> Self {
        Self {
            max_vr_issues: 5,
            max_elements: 50,
            max_value_chars: 100,
        }
    }
}

/// Renders the findings followed by the file summary.
///
/// Disallowed VR findings are listed together under one heading, of which
/// only the first `max_vr_issues` are shown.
pub fn render_text(report: &Report, limits: &DisplayLimits) -> String {
    let mut lines = Vec::new();

    if report.has_findings() {
        lines.push("Potential anonymization issues found:".to_string());

        let vr_issues = report.findings_for(RuleId::DisallowedVr).count();
        let hidden = vr_issues.saturating_sub(limits.max_vr_issues);
        let mut listed = 0;

        for finding in &report.findings {
            if finding.code != RuleId::DisallowedVr {
                lines.push(format!("   - {finding}"));
                continue;
            }

            listed += 1;
            if listed == 1 {
                lines.push(VR_ISSUES_HEADING.to_string());
            }
            if listed <= limits.max_vr_issues {
                lines.push(format!("     - {}", finding.message));
            }
            if listed == vr_issues && hidden > 0 {
                lines.push(format!("     ... and {hidden} more"));
            }
        }
    } else {
        lines.push("No obvious compatibility issues found".to_string());
    }

    let summary = &report.summary;
    lines.push(String::new());
    lines.push("File summary:".to_string());
    lines.push(format!("  Total elements: {}", summary.total_elements));
    lines.push(format!("  Private tags: {}", summary.private_tags));
    lines.push(format!("  Transfer Syntax: {}", summary.transfer_syntax));

    lines.join("\n")
}

/// Lists the first `max_elements` top level elements with a value preview.
pub fn render_elements(dataset: &Dataset, limits: &DisplayLimits) -> String {
    let heading = format!("All Data Elements (first {}):", limits.max_elements);
    let mut lines = vec![heading];
    for elem in dataset.elements().take(limits.max_elements) {
        lines.push(format!(
            "  {}: {}",
            label(elem),
            preview(elem.value(), limits.max_value_chars)
        ));
    }
    if dataset.len() > limits.max_elements {
        lines.push("  ... (truncated)".to_string());
    }
    lines.join("\n")
}

/// Lists every top level sequence element with its number of items.
pub fn render_sequences(dataset: &Dataset) -> String {
    let mut lines = vec!["Sequence Elements:".to_string()];
    for elem in dataset.elements().filter(|e| e.vr() == VR::SQ) {
        let content = match elem.value().items() {
            Some(items) => format!("Sequence with {} items", items.len()),
            None if elem.is_empty() => "Sequence with 0 items".to_string(),
            None => "<not iterable>".to_string(),
        };
        lines.push(format!("  {}: {content}", label(elem)));
    }
    lines.join("\n")
}

/// Detailed readout of one element, the way a decoder would report it.
pub fn describe_element(dataset: &Dataset, tag: Tag) -> String {
    let Some(elem) = dataset.lookup(tag) else {
        return format!("Tag {tag}: not present in dataset");
    };

    [
        format!("Tag {tag}:"),
        format!("  Keyword: {}", elem.keyword_or_blank()),
        format!("  VR: {}", elem.vr()),
        format!("  VM: {}", elem.value_multiplicity()),
        format!("  is_empty: {}", elem.is_empty()),
        format!("  is_undefined_length: {}", elem.is_undefined_length()),
        format!("  value: {}", preview(elem.value(), usize::MAX)),
    ]
    .join("\n")
}

fn label(elem: &DataElement) -> String {
    match elem.keyword() {
        Some(keyword) => format!("{} {keyword}", elem.tag()),
        None => elem.tag().to_string(),
    }
}

fn preview(value: &ElementValue, max_chars: usize) -> String {
    match value {
        ElementValue::Bytes(bytes) => format!("<binary data, {} bytes>", bytes.len()),
        ElementValue::Items(items) => format!("<sequence, {} items>", items.len()),
        other => {
            let text = other.to_text().unwrap_or_default();
            if text.chars().count() > max_chars {
                let truncated: String = text.chars().take(max_chars).collect();
                format!("{truncated}...")
            } else {
                text
            }
        }
    }
}
