use crate::config::Config;
use crate::dataset::Dataset;
use crate::rules::{Finding, Rule, RuleId};

/// Emits one aggregate finding when the dataset holds more private tags
/// than the configured threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivateTagVolume;

impl Rule for PrivateTagVolume {
    fn id(&self) -> RuleId {
        RuleId::PrivateTagVolume
    }

    fn check(&self, config: &Config, dataset: &Dataset) -> Vec<Finding> {
        let count = dataset.private_tag_count();
        if count <= config.private_tag_threshold() {
            return Vec::new();
        }

        vec![Finding::info(
            self.id(),
            format!("high private tag count: {count}"),
            None,
        )]
    }
}
