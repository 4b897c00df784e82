//! Field catalog: read-only registry of the condition fields a segment
//! group can be built from.

use campaign_core::{CampaignError, CampaignResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::conditions::{ConditionValue, DateCondition, RangeValue};

/// Editor shape of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueType {
    Select,
    Radio,
    Checkbox,
    Tags,
    Text,
    Range,
    DateCondition,
}

impl ValueType {
    /// Types whose values are picked from `FieldDefinition::options`.
    pub fn has_options(self) -> bool {
        matches!(self, ValueType::Select | ValueType::Radio | ValueType::Checkbox)
    }
}

/// Palette grouping. Declaration order is the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldCategory {
    Attributes,
    Demographics,
    Activity,
}

impl FieldCategory {
    pub const ALL: [FieldCategory; 3] = [
        FieldCategory::Attributes,
        FieldCategory::Demographics,
        FieldCategory::Activity,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
    /// Approximate audience for this option, display only.
    pub count_hint: Option<String>,
}

impl FieldOption {
    fn new(value: &str, label: &str, count_hint: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
            count_hint: Some(count_hint.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDefinition {
    pub id: String,
    pub label: String,
    pub value_type: ValueType,
    pub category: FieldCategory,
    pub options: Vec<FieldOption>,
    pub placeholder: Option<String>,
    pub default_value: ConditionValue,
    /// Approximate audience for the field as a whole, display only.
    pub mock_count: Option<String>,
}

impl FieldDefinition {
    pub fn option(&self, value: &str) -> Option<&FieldOption> {
        self.options.iter().find(|o| o.value == value)
    }

    /// Option label for `value`, falling back to the raw value.
    pub fn option_label<'a>(&'a self, value: &'a str) -> &'a str {
        self.option(value).map_or(value, |o| o.label.as_str())
    }
}

/// Immutable, ordered set of field definitions with unique ids.
#[derive(Debug, Clone)]
pub struct FieldCatalog {
    fields: Vec<FieldDefinition>,
}

impl FieldCatalog {
    /// Build a catalog, rejecting duplicate ids, choice fields without
    /// options, and defaults whose shape does not match the value type.
    pub fn new(fields: Vec<FieldDefinition>) -> CampaignResult<Self> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.id.as_str()) {
                return Err(CampaignError::Validation(format!(
                    "duplicate field id '{}'",
                    field.id
                )));
            }
            if field.value_type.has_options() && field.options.is_empty() {
                return Err(CampaignError::Validation(format!(
                    "field '{}' has no options",
                    field.id
                )));
            }
            if field.default_value.value_type() != field.value_type {
                return Err(CampaignError::Validation(format!(
                    "default value of '{}' is {:?}, expected {:?}",
                    field.id,
                    field.default_value.value_type(),
                    field.value_type
                )));
            }
        }
        Ok(Self { fields })
    }

    /// The stock marketing catalog: seven fields across three categories.
    pub fn standard() -> Self {
        let fields = vec![
            FieldDefinition {
                id: "user_type".into(),
                label: "User Type".into(),
                value_type: ValueType::Select,
                category: FieldCategory::Attributes,
                options: vec![
                    FieldOption::new("all", "All Users", "2.4M"),
                    FieldOption::new("free", "Free Plan", "1.8M"),
                    FieldOption::new("premium", "Premium Plan", "500K"),
                    FieldOption::new("enterprise", "Enterprise", "100K"),
                ],
                placeholder: None,
                default_value: ConditionValue::Select("all".into()),
                mock_count: Some("2.4M".into()),
            },
            FieldDefinition {
                id: "last_login".into(),
                label: "Last Login".into(),
                value_type: ValueType::Radio,
                category: FieldCategory::Activity,
                options: vec![
                    FieldOption::new("7d", "7 Days", "150K"),
                    FieldOption::new("30d", "30 Days", "450K"),
                    FieldOption::new("90d", "90 Days", "850K"),
                    FieldOption::new("never", "Inactive", "1.5M"),
                ],
                placeholder: None,
                default_value: ConditionValue::Radio("30d".into()),
                mock_count: Some("850K".into()),
            },
            FieldDefinition {
                id: "region".into(),
                label: "Region".into(),
                value_type: ValueType::Checkbox,
                category: FieldCategory::Demographics,
                options: vec![
                    FieldOption::new("jp", "Japan", "450K"),
                    FieldOption::new("us", "North America", "1.2M"),
                    FieldOption::new("eu", "Europe", "600K"),
                    FieldOption::new("apac", "Asia Pacific", "800K"),
                ],
                placeholder: None,
                default_value: ConditionValue::Checkbox(vec!["jp".into()]),
                mock_count: Some("1.2M".into()),
            },
            FieldDefinition {
                id: "custom_tags".into(),
                label: "Tags".into(),
                value_type: ValueType::Tags,
                category: FieldCategory::Attributes,
                options: Vec::new(),
                placeholder: Some("Type tag...".into()),
                default_value: ConditionValue::Tags(Vec::new()),
                mock_count: Some("Varies".into()),
            },
            FieldDefinition {
                id: "age_range".into(),
                label: "Age Range".into(),
                value_type: ValueType::Range,
                category: FieldCategory::Demographics,
                options: Vec::new(),
                placeholder: None,
                default_value: ConditionValue::Range(RangeValue::default()),
                mock_count: Some("All".into()),
            },
            FieldDefinition {
                id: "signup_date".into(),
                label: "Signup Date".into(),
                value_type: ValueType::DateCondition,
                category: FieldCategory::Activity,
                options: Vec::new(),
                placeholder: None,
                default_value: ConditionValue::Date(DateCondition::default()),
                mock_count: Some("All".into()),
            },
            FieldDefinition {
                id: "description".into(),
                label: "Description".into(),
                value_type: ValueType::Text,
                category: FieldCategory::Attributes,
                options: Vec::new(),
                placeholder: Some("Search description...".into()),
                default_value: ConditionValue::Text(String::new()),
                mock_count: Some("-".into()),
            },
        ];
        Self { fields }
    }

    /// Look up a field. Callers treat `None` as "skip", never as a fault.
    pub fn get(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Fields of one category, in catalog order.
    pub fn by_category(&self, category: FieldCategory) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(move |f| f.category == category)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
