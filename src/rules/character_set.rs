use crate::config::Config;
use crate::dataset::Dataset;
use crate::rules::{Finding, Rule, RuleId};
use crate::tags;

/// Checks Specific Character Set against the allowed values.
///
/// An absent tag means the default repertoire (ISO_IR 6) and is fine.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterSet;

impl Rule for CharacterSet {
    fn id(&self) -> RuleId {
        RuleId::CharacterSet
    }

    fn check(&self, config: &Config, dataset: &Dataset) -> Vec<Finding> {
        let Some(elem) = dataset.lookup(tags::SPECIFIC_CHARACTER_SET) else {
            return Vec::new();
        };

        match elem.value().to_text() {
            Some(value) if config.is_allowed_character_set(&value) => Vec::new(),
            Some(value) => vec![Finding::warning(
                self.id(),
                format!("non-standard character set: {value}"),
                Some(elem.tag()),
            )],
            None => vec![Finding::warning(
                self.id(),
                "non-standard character set: <non-text value>",
                Some(elem.tag()),
            )],
        }
    }
}
