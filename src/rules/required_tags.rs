use crate::config::Config;
use crate::dataset::Dataset;
use crate::element::keyword_of;
use crate::rules::{Finding, Rule, RuleId};

/// Reports each configured required tag that is absent or empty, in configured order.
#[derive(Debug, Clone, PartialEq)]
pub struct RequiredTags;

impl Rule for RequiredTags {
    fn id(&self) -> RuleId {
        RuleId::RequiredTags
    }

    fn check(&self, config: &Config, dataset: &Dataset) -> Vec<Finding> {
        config
            .required_tags()
            .iter()
            .filter_map(|&tag| {
                let label = match keyword_of(tag) {
                    Some(keyword) => format!("{tag} ({keyword})"),
                    None => format!("{tag}"),
                };
                match dataset.lookup(tag) {
                    None => Some(Finding::warning(
                        self.id(),
                        format!("missing required tag {label}"),
                        Some(tag),
                    )),
                    Some(elem) if elem.is_empty() => Some(Finding::warning(
                        self.id(),
                        format!("empty required tag {label}"),
                        Some(tag),
                    )),
                    Some(_) => None,
                }
            })
            .collect()
    }
}
