use crate::config::Config;
use crate::dataset::Dataset;
use crate::element::is_pixel_data_group;
use crate::rules::{describe, Finding, Rule, RuleId};

/// Reports every element with a binary or unknown VR, except pixel data.
///
/// Each occurrence is its own finding. Capping how many of them are shown is
/// left to whoever renders the report.
#[derive(Debug, Clone, PartialEq)]
pub struct DisallowedVr;

impl Rule for DisallowedVr {
    fn id(&self) -> RuleId {
        RuleId::DisallowedVr
    }

    fn check(&self, config: &Config, dataset: &Dataset) -> Vec<Finding> {
        dataset
            .elements()
            .filter(|elem| config.is_disallowed_vr(elem.vr()))
            .filter(|elem| !is_pixel_data_group(&elem.tag(), config.pixel_data_group()))
            .map(|elem| {
                Finding::warning(
                    self.id(),
                    format!("{} has VR={}", describe(elem), elem.vr()),
                    Some(elem.tag()),
                )
            })
            .collect()
    }
}
