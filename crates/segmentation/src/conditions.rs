//! Condition values: one typed shape per field `ValueType`, plus the pure
//! edits the card editors apply to them.

use campaign_core::{CampaignError, CampaignResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::ValueType;

/// Current value of one field inside a group.
///
/// Serializes untagged so the submission payload carries the bare value
/// (`"premium"`, `["jp","us"]`, `{"min":"18","max":""}`). Deserialization
/// needs the owning field's type, see [`ConditionValue::from_json`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Select(String),
    Radio(String),
    /// Selected option values, unique, in selection order.
    Checkbox(Vec<String>),
    /// Free-text tags, duplicates allowed, in insertion order.
    Tags(Vec<String>),
    /// Substring match.
    Text(String),
    Range(RangeValue),
    Date(DateCondition),
}

/// Numeric bounds kept as text until submission. Empty means open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeValue {
    #[serde(default)]
    pub min: String,
    #[serde(default)]
    pub max: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeBound {
    Min,
    Max,
}

// ---------------------------------------------------------------------------
// Date conditions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateMode {
    #[default]
    Absolute,
    Relative,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeKind {
    #[default]
    Preset,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatePreset {
    #[serde(rename = "last_7d")]
    Last7d,
    #[serde(rename = "last_30d")]
    Last30d,
    #[serde(rename = "next_30d")]
    Next30d,
    #[serde(rename = "yesterday")]
    Yesterday,
    #[serde(rename = "today")]
    Today,
}

impl DatePreset {
    pub fn as_str(self) -> &'static str {
        match self {
            DatePreset::Last7d => "last_7d",
            DatePreset::Last30d => "last_30d",
            DatePreset::Next30d => "next_30d",
            DatePreset::Yesterday => "yesterday",
            DatePreset::Today => "today",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[default]
    Days,
    Weeks,
    Months,
}

impl TimeUnit {
    /// Length in days. Months are a flat 30 days.
    pub fn days(self) -> i64 {
        match self {
            TimeUnit::Days => 1,
            TimeUnit::Weeks => 7,
            TimeUnit::Months => 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Ago,
    Future,
}

/// One end of a custom relative range, e.g. "3 weeks ago".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeEndpoint {
    pub value: u32,
    pub unit: TimeUnit,
    pub direction: Direction,
}

impl RelativeEndpoint {
    pub fn days_ago(value: u32) -> Self {
        Self {
            value,
            unit: TimeUnit::Days,
            direction: Direction::Ago,
        }
    }

    /// Signed day offset from today.
    pub fn offset_days(&self) -> i64 {
        let days = i64::from(self.value) * self.unit.days();
        match self.direction {
            Direction::Ago => -days,
            Direction::Future => days,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRange {
    pub from: RelativeEndpoint,
    pub to: RelativeEndpoint,
}

impl Default for CustomRange {
    fn default() -> Self {
        Self {
            from: RelativeEndpoint::days_ago(7),
            to: RelativeEndpoint::days_ago(0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsoluteDates {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelativeDates {
    #[serde(rename = "type")]
    pub kind: RelativeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_id: Option<DatePreset>,
    #[serde(default)]
    pub custom: CustomRange,
}

impl Default for RelativeDates {
    fn default() -> Self {
        Self {
            kind: RelativeKind::Preset,
            preset_id: Some(DatePreset::Last30d),
            custom: CustomRange::default(),
        }
    }
}

/// Absolute or relative date window. Both sub-structures are always kept
/// so switching `mode` back and forth preserves earlier input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateCondition {
    pub mode: DateMode,
    #[serde(default)]
    pub absolute: AbsoluteDates,
    #[serde(default)]
    pub relative: RelativeDates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateBound {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    From,
    To,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointEdit {
    Value(u32),
    Unit(TimeUnit),
    Direction(Direction),
}

// ---------------------------------------------------------------------------
// Edits
// ---------------------------------------------------------------------------

/// A single editor interaction on a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "edit")]
pub enum ConditionEdit {
    ToggleOption { option: String },
    AddTag { tag: String },
    RemoveTag { tag: String },
    SetRangeBound { bound: RangeBound, value: String },
    SetDateMode { mode: DateMode },
    SetAbsoluteDate { bound: DateBound, value: String },
    SetRelativeKind { kind: RelativeKind },
    /// Picking a preset also switches the relative kind to preset.
    SetPreset { preset: DatePreset },
    /// Editing an endpoint also switches the relative kind to custom.
    SetCustomEndpoint { endpoint: Endpoint, change: EndpointEdit },
}

impl ConditionValue {
    /// Build a checkbox value, dropping repeated options.
    pub fn checkbox<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selected: Vec<String> = Vec::new();
        for v in values {
            let v = v.into();
            if !selected.contains(&v) {
                selected.push(v);
            }
        }
        ConditionValue::Checkbox(selected)
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            ConditionValue::Select(_) => ValueType::Select,
            ConditionValue::Radio(_) => ValueType::Radio,
            ConditionValue::Checkbox(_) => ValueType::Checkbox,
            ConditionValue::Tags(_) => ValueType::Tags,
            ConditionValue::Text(_) => ValueType::Text,
            ConditionValue::Range(_) => ValueType::Range,
            ConditionValue::Date(_) => ValueType::DateCondition,
        }
    }

    /// Parse a bare JSON value as the given field type.
    pub fn from_json(value_type: ValueType, json: serde_json::Value) -> CampaignResult<Self> {
        let value = match value_type {
            ValueType::Select => ConditionValue::Select(expect_string(value_type, json)?),
            ValueType::Radio => ConditionValue::Radio(expect_string(value_type, json)?),
            ValueType::Text => ConditionValue::Text(expect_string(value_type, json)?),
            ValueType::Checkbox => {
                ConditionValue::checkbox(serde_json::from_value::<Vec<String>>(json)?)
            }
            ValueType::Tags => ConditionValue::Tags(serde_json::from_value(json)?),
            ValueType::Range => ConditionValue::Range(serde_json::from_value(json)?),
            ValueType::DateCondition => ConditionValue::Date(serde_json::from_value(json)?),
        };
        Ok(value)
    }

    /// Apply an edit and return the next value. Edits that do not fit the
    /// value's shape leave it unchanged. Range and date edits on a value of
    /// another shape start over from that shape's default.
    pub fn apply(&self, edit: &ConditionEdit) -> ConditionValue {
        match (self, edit) {
            (ConditionValue::Checkbox(selected), ConditionEdit::ToggleOption { option }) => {
                let next = if selected.contains(option) {
                    selected.iter().filter(|v| *v != option).cloned().collect()
                } else {
                    let mut next = selected.clone();
                    next.push(option.clone());
                    next
                };
                ConditionValue::Checkbox(next)
            }
            (ConditionValue::Tags(tags), ConditionEdit::AddTag { tag }) => {
                let trimmed = tag.trim();
                if trimmed.is_empty() {
                    debug!("ignoring blank tag");
                    return self.clone();
                }
                let mut next = tags.clone();
                next.push(trimmed.to_string());
                ConditionValue::Tags(next)
            }
            (ConditionValue::Tags(tags), ConditionEdit::RemoveTag { tag }) => {
                ConditionValue::Tags(tags.iter().filter(|t| *t != tag).cloned().collect())
            }
            (_, ConditionEdit::SetRangeBound { bound, value }) => {
                let mut range = match self {
                    ConditionValue::Range(r) => r.clone(),
                    _ => RangeValue::default(),
                };
                match bound {
                    RangeBound::Min => range.min = value.clone(),
                    RangeBound::Max => range.max = value.clone(),
                }
                ConditionValue::Range(range)
            }
            (_, date_edit @ (ConditionEdit::SetDateMode { .. }
            | ConditionEdit::SetAbsoluteDate { .. }
            | ConditionEdit::SetRelativeKind { .. }
            | ConditionEdit::SetPreset { .. }
            | ConditionEdit::SetCustomEndpoint { .. })) => {
                let mut date = match self {
                    ConditionValue::Date(d) => d.clone(),
                    _ => DateCondition::default(),
                };
                date.apply(date_edit);
                ConditionValue::Date(date)
            }
            (value, edit) => {
                debug!(value_type = ?value.value_type(), ?edit, "edit does not apply to value");
                self.clone()
            }
        }
    }
}

impl DateCondition {
    fn apply(&mut self, edit: &ConditionEdit) {
        match edit {
            ConditionEdit::SetDateMode { mode } => self.mode = *mode,
            ConditionEdit::SetAbsoluteDate { bound, value } => match bound {
                DateBound::Start => self.absolute.start = value.clone(),
                DateBound::End => self.absolute.end = value.clone(),
            },
            ConditionEdit::SetRelativeKind { kind } => self.relative.kind = *kind,
            ConditionEdit::SetPreset { preset } => {
                self.relative.kind = RelativeKind::Preset;
                self.relative.preset_id = Some(*preset);
            }
            ConditionEdit::SetCustomEndpoint { endpoint, change } => {
                self.relative.kind = RelativeKind::Custom;
                let target = match endpoint {
                    Endpoint::From => &mut self.relative.custom.from,
                    Endpoint::To => &mut self.relative.custom.to,
                };
                match change {
                    EndpointEdit::Value(v) => target.value = *v,
                    EndpointEdit::Unit(u) => target.unit = *u,
                    EndpointEdit::Direction(d) => target.direction = *d,
                }
            }
            _ => {}
        }
    }
}

fn expect_string(value_type: ValueType, json: serde_json::Value) -> CampaignResult<String> {
    match json {
        serde_json::Value::String(s) => Ok(s),
        other => Err(CampaignError::Validation(format!(
            "{value_type:?} value must be a string, got {other}"
        ))),
    }
}
