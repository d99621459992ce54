use dicom_core::VR;

use crate::config::Config;
use crate::dataset::Dataset;
use crate::rules::{describe, Finding, Rule, RuleId};

/// Checks that every SQ element holds a list of items and that none of the
/// items is a missing placeholder. Items are visited in storage order.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceIntegrity;

impl Rule for SequenceIntegrity {
    fn id(&self) -> RuleId {
        RuleId::SequenceIntegrity
    }

    fn check(&self, _config: &Config, dataset: &Dataset) -> Vec<Finding> {
        let mut findings = Vec::new();

        for elem in dataset.elements() {
            if elem.vr() != VR::SQ {
                continue;
            }
            let Some(items) = elem.value().items() else {
                // an empty SQ element decodes without any items at all
                if !elem.is_empty() {
                    findings.push(Finding::warning(
                        self.id(),
                        format!("sequence {} is not iterable", describe(elem)),
                        Some(elem.tag()),
                    ));
                }
                continue;
            };

            for (index, item) in items.iter().enumerate() {
                if item.is_none() {
                    findings.push(Finding::warning(
                        self.id(),
                        format!("sequence {} item missing at index {index}", describe(elem)),
                        Some(elem.tag()),
                    ));
                }
            }
        }

        findings
    }
}
