//! Shared test fixtures

use crate::definition::TemplateDefinition;
use crate::domain::{TemplateScope, TemplateSet};

pub(crate) const RESIDENTIAL: &str = include_str!("../tests/fixtures/residential.yml");

/// The residential template as a draft
pub(crate) fn residential() -> TemplateSet {
    TemplateDefinition::from_yaml_str(RESIDENTIAL)
        .expect("fixture parses")
        .into_template_set(TemplateScope::Global, "author-1")
        .expect("fixture converts")
}
