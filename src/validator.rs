use log::debug;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::Config;
use crate::dataset::Dataset;
use crate::rules::{Finding, Rule, RuleId};

const UNKNOWN_TRANSFER_SYNTAX: &str = "Unknown";

/// Derived facts about a dataset, reported next to the findings.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub total_elements: usize,
    pub private_tags: usize,
    pub transfer_syntax: String,
}

/// The findings of one validation run together with the dataset summary.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Report {
    pub findings: Vec<Finding>,
    pub summary: Summary,
}

impl Report {
    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }

    pub fn findings_for(&self, code: RuleId) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.code == code)
    }
}

/// Runs the fixed pipeline of rules over a dataset.
///
/// Rules never short-circuit each other. The findings of all rules are
/// concatenated in the order of [`RuleId::ALL`], so validating the same
/// dataset twice gives identical results.
///
/// # Example
///
/// ```
/// use dicom_preflight::{Dataset, Validator};
///
/// let validator = Validator::default();
/// let report = validator.run(&Dataset::new());
///
/// // all five required tags are missing
/// assert_eq!(report.findings.len(), 5);
/// assert_eq!(report.summary.transfer_syntax, "Unknown");
/// ```
pub struct Validator {
    config: Config,
    rules: Vec<Box<dyn Rule>>,
}

impl Validator {
    pub fn new(config: Config) -> Self {
        let rules = RuleId::ALL.iter().map(RuleId::get_rule_struct).collect();
        Self { config, rules }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns all findings for the dataset, in rule order.
    pub fn validate(&self, dataset: &Dataset) -> Vec<Finding> {
        self.rules
            .iter()
            .flat_map(|rule| self.check(rule.as_ref(), dataset))
            .collect()
    }

    /// Same as [`Validator::validate`], evaluating the rules on the rayon thread pool.
    ///
    /// The per-rule results are concatenated in rule order afterwards.
    pub fn validate_parallel(&self, dataset: &Dataset) -> Vec<Finding> {
        self.rules
            .par_iter()
            .map(|rule| self.check(rule.as_ref(), dataset))
            .collect::<Vec<Vec<Finding>>>()
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn summarize(&self, dataset: &Dataset) -> Summary {
        Summary {
            total_elements: dataset.len(),
            private_tags: dataset.private_tag_count(),
            transfer_syntax: dataset
                .file_meta()
                .transfer_syntax_uid()
                .unwrap_or_else(|| UNKNOWN_TRANSFER_SYNTAX.into()),
        }
    }

    /// Validates the dataset and computes its summary once.
    pub fn run(&self, dataset: &Dataset) -> Report {
        Report {
            findings: self.validate(dataset),
            summary: self.summarize(dataset),
        }
    }

    fn check(&self, rule: &dyn Rule, dataset: &Dataset) -> Vec<Finding> {
        let findings = rule.check(&self.config, dataset);
        debug!("rule {} produced {} finding(s)", rule.id(), findings.len());
        findings
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rules: Vec<RuleId> = self.rules.iter().map(|rule| rule.id()).collect();
        f.debug_struct("Validator")
            .field("config", &self.config)
            .field("rules", &rules)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use dicom_core::{Tag, VR};

    use crate::config::ConfigBuilder;
    use crate::dataset::FileMeta;
    use crate::element::{DataElement, ElementValue};
    use crate::rules::Severity;
    use crate::tags;
    use crate::test_utils::{make_complete_dataset, make_private_dataset};

    #[test]
    fn test_clean_dataset() {
        let report = Validator::default().run(&make_complete_dataset());
        assert!(!report.has_findings());
        assert_eq!(report.summary.transfer_syntax, "1.2.840.10008.1.2.1");
    }

    #[test]
    fn test_findings_follow_rule_order() {
        let mut ds = make_private_dataset(51);
        ds.put(DataElement::new(
            tags::SPECIFIC_CHARACTER_SET,
            VR::CS,
            "GB18030",
        ));
        ds.put(DataElement::new(
            tags::REFERENCED_IMAGE_SEQUENCE,
            VR::SQ,
            ElementValue::Items(vec![None]),
        ));
        ds.put(DataElement::new(Tag(0x0009, 0x1100), VR::UN, vec![1u8, 2]));

        let findings = Validator::default().validate(&ds);
        let codes: Vec<RuleId> = findings.iter().map(|f| f.code).collect();

        let mut sorted = codes.clone();
        sorted.sort_by_key(|code| RuleId::ALL.iter().position(|id| id == code));
        assert_eq!(codes, sorted);

        let count = |code: RuleId| findings.iter().filter(|f| f.code == code).count();
        assert_eq!(count(RuleId::RequiredTags), 5);
        assert_eq!(count(RuleId::DisallowedVr), 1);
        assert_eq!(count(RuleId::SequenceIntegrity), 1);
        assert_eq!(count(RuleId::PrivateTagVolume), 1);
        assert_eq!(count(RuleId::CharacterSet), 1);
    }

    #[test]
    fn test_private_count_includes_all_odd_groups() {
        let mut ds = make_private_dataset(50);
        ds.put(DataElement::new(Tag(0x0009, 0x1100), VR::UN, vec![1u8, 2]));

        let findings = Validator::default().validate(&ds);
        let aggregate: Vec<_> = findings
            .iter()
            .filter(|f| f.code == RuleId::PrivateTagVolume)
            .collect();
        assert_eq!(aggregate.len(), 1);
        assert_eq!(aggregate[0].severity, Severity::Info);
        assert!(aggregate[0].message.contains("51"));
    }

    #[test]
    fn test_idempotent() {
        let mut ds = make_private_dataset(60);
        ds.put(DataElement::new(Tag(0x0011, 0x1001), VR::OB, vec![0u8; 4]));
        let validator = Validator::default();
        assert_eq!(validator.validate(&ds), validator.validate(&ds));
        assert_eq!(validator.run(&ds), validator.run(&ds));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut ds = make_private_dataset(55);
        ds.put(DataElement::new(
            tags::SPECIFIC_CHARACTER_SET,
            VR::CS,
            "ISO_IR 13",
        ));
        for element in 0..10u16 {
            let tag = Tag(0x0019, 0x1000 + element);
            ds.put(DataElement::new(tag, VR::UN, vec![element as u8]));
        }
        let validator = Validator::default();
        assert_eq!(validator.validate_parallel(&ds), validator.validate(&ds));
    }

    #[test]
    fn test_summary() {
        let meta = FileMeta::from_identity("1.2.840.10008.1.2", "1.2", "3.4");
        let mut ds = Dataset::with_meta(meta);
        ds.put(DataElement::new(tags::PATIENT_ID, VR::LO, "12345"));
        ds.put(DataElement::new(Tag(0x0009, 0x0010), VR::LO, "VENDOR"));

        let summary = Validator::default().summarize(&ds);
        assert_eq!(
            summary,
            Summary {
                total_elements: 2,
                private_tags: 1,
                transfer_syntax: "1.2.840.10008.1.2".into(),
            }
        );
    }

    #[test]
    fn test_custom_profile() {
        let config = ConfigBuilder::new()
            .required_tags([tags::MODALITY])
            .private_tag_threshold(1000)
            .build();
        let findings = Validator::new(config).validate(&make_private_dataset(60));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].tag, Some(tags::MODALITY));
    }

    #[test]
    fn test_report_json_shape() {
        let report = Validator::default().run(&Dataset::new());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["findings"][0]["code"], "required-tags");
        assert_eq!(json["findings"][0]["tag"], "(0008,0018)");
        assert_eq!(json["summary"]["total_elements"], 0);
        assert_eq!(json["summary"]["transfer_syntax"], "Unknown");
    }
}
