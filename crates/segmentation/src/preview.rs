//! One-line summaries of condition values, shown on collapsed field cards.

use chrono::{Duration, Local, NaiveDate};

use crate::catalog::FieldDefinition;
use crate::conditions::{ConditionValue, DateCondition, DateMode, RelativeEndpoint, RelativeKind};

/// Checkbox selections above this count are summarized as "{n} selected".
const MAX_LISTED_OPTIONS: usize = 3;

/// Preview text for `value`, resolving relative dates against today's
/// local date.
pub fn preview(field: &FieldDefinition, value: &ConditionValue) -> String {
    preview_on(field, value, Local::now().date_naive())
}

/// Preview text for `value` with relative dates resolved against `today`.
pub fn preview_on(field: &FieldDefinition, value: &ConditionValue, today: NaiveDate) -> String {
    match value {
        ConditionValue::Select(v) | ConditionValue::Radio(v) => field.option_label(v).to_string(),
        ConditionValue::Checkbox(selected) => {
            if selected.is_empty() {
                "None selected".to_string()
            } else if selected.len() > MAX_LISTED_OPTIONS {
                format!("{} selected", selected.len())
            } else {
                selected
                    .iter()
                    .map(|v| field.option_label(v))
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }
        ConditionValue::Tags(tags) => {
            if tags.is_empty() {
                "No tags".to_string()
            } else {
                tags.join(", ")
            }
        }
        ConditionValue::Text(text) => {
            if text.is_empty() {
                "Empty".to_string()
            } else {
                format!("Contains \"{text}\"")
            }
        }
        ConditionValue::Range(range) => format!(
            "{} - {}",
            or_placeholder(&range.min, "0"),
            or_placeholder(&range.max, "∞")
        ),
        ConditionValue::Date(date) => date_preview(date, today),
    }
}

fn date_preview(date: &DateCondition, today: NaiveDate) -> String {
    match date.mode {
        DateMode::Absolute => format!(
            "{} - {}",
            or_placeholder(&date.absolute.start, "?"),
            or_placeholder(&date.absolute.end, "?")
        ),
        DateMode::Relative => match date.relative.kind {
            RelativeKind::Preset => date
                .relative
                .preset_id
                .map_or_else(|| "Relative".to_string(), |p| start_case(p.as_str())),
            RelativeKind::Custom => {
                let custom = &date.relative.custom;
                format!(
                    "{} - {} (Custom)",
                    resolved_label(&custom.from, today),
                    resolved_label(&custom.to, today)
                )
            }
        },
    }
}

/// Calendar date `endpoint` points at, counted from `today`.
/// `None` when the offset leaves the representable date range.
pub fn resolve_relative_date(endpoint: &RelativeEndpoint, today: NaiveDate) -> Option<NaiveDate> {
    today.checked_add_signed(Duration::try_days(endpoint.offset_days())?)
}

/// Short numeric date in the `M/D/YYYY` form.
pub fn format_locale_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

fn resolved_label(endpoint: &RelativeEndpoint, today: NaiveDate) -> String {
    resolve_relative_date(endpoint, today).map_or_else(|| "?".to_string(), format_locale_date)
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() {
        placeholder
    } else {
        value
    }
}

/// `last_30d` -> `Last 30d`
fn start_case(id: &str) -> String {
    id.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldCatalog;
    use crate::conditions::{
        CustomRange, DatePreset, Direction, RangeValue, RelativeDates, TimeUnit,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn field(id: &str) -> FieldDefinition {
        FieldCatalog::standard().get(id).unwrap().clone()
    }

    #[test]
    fn test_select_uses_option_label() {
        let f = field("user_type");
        assert_eq!(
            preview_on(&f, &ConditionValue::Select("premium".into()), today()),
            "Premium Plan"
        );
        assert_eq!(
            preview_on(&f, &ConditionValue::Select("gold".into()), today()),
            "gold"
        );
    }

    #[test]
    fn test_checkbox_boundary() {
        let f = field("region");
        assert_eq!(
            preview_on(&f, &ConditionValue::checkbox(Vec::<String>::new()), today()),
            "None selected"
        );
        assert_eq!(
            preview_on(&f, &ConditionValue::checkbox(["us", "jp", "eu"]), today()),
            "North America, Japan, Europe"
        );
        assert_eq!(
            preview_on(&f, &ConditionValue::checkbox(["us", "jp", "eu", "apac"]), today()),
            "4 selected"
        );
    }

    #[test]
    fn test_tags_and_text() {
        let tags = field("custom_tags");
        assert_eq!(
            preview_on(&tags, &ConditionValue::Tags(Vec::new()), today()),
            "No tags"
        );
        assert_eq!(
            preview_on(
                &tags,
                &ConditionValue::Tags(vec!["vip".into(), "beta".into()]),
                today()
            ),
            "vip, beta"
        );

        let text = field("description");
        assert_eq!(
            preview_on(&text, &ConditionValue::Text(String::new()), today()),
            "Empty"
        );
        assert_eq!(
            preview_on(&text, &ConditionValue::Text("promo".into()), today()),
            "Contains \"promo\""
        );
    }

    #[test]
    fn test_range_placeholders() {
        let f = field("age_range");
        assert_eq!(
            preview_on(&f, &ConditionValue::Range(RangeValue::default()), today()),
            "0 - ∞"
        );
        let r = RangeValue {
            min: "18".into(),
            max: "65".into(),
        };
        assert_eq!(preview_on(&f, &ConditionValue::Range(r), today()), "18 - 65");
    }

    #[test]
    fn test_absolute_date_placeholders() {
        let f = field("signup_date");
        let mut d = DateCondition::default();
        assert_eq!(preview_on(&f, &ConditionValue::Date(d.clone()), today()), "? - ?");
        d.absolute.start = "2024-01-01".into();
        assert_eq!(
            preview_on(&f, &ConditionValue::Date(d), today()),
            "2024-01-01 - ?"
        );
    }

    #[test]
    fn test_preset_start_case() {
        let f = field("signup_date");
        let d = DateCondition {
            mode: DateMode::Relative,
            relative: RelativeDates {
                preset_id: Some(DatePreset::Last30d),
                ..RelativeDates::default()
            },
            ..DateCondition::default()
        };
        assert_eq!(preview_on(&f, &ConditionValue::Date(d), today()), "Last 30d");
        assert_eq!(start_case("yesterday"), "Yesterday");
        assert_eq!(start_case("next_30d"), "Next 30d");
    }

    #[test]
    fn test_custom_range_resolves_dates() {
        let f = field("signup_date");
        let d = DateCondition {
            mode: DateMode::Relative,
            relative: RelativeDates {
                kind: RelativeKind::Custom,
                preset_id: None,
                custom: CustomRange {
                    from: RelativeEndpoint::days_ago(7),
                    to: RelativeEndpoint::days_ago(0),
                },
            },
            ..DateCondition::default()
        };
        assert_eq!(
            preview_on(&f, &ConditionValue::Date(d), today()),
            "3/8/2024 - 3/15/2024 (Custom)"
        );
    }

    #[test]
    fn test_custom_range_with_live_clock() {
        let f = field("signup_date");
        let d = DateCondition {
            mode: DateMode::Relative,
            relative: RelativeDates {
                kind: RelativeKind::Custom,
                ..RelativeDates::default()
            },
            ..DateCondition::default()
        };
        let text = preview(&f, &ConditionValue::Date(d));
        assert!(text.contains(" - "));
        assert!(text.ends_with("(Custom)"));
    }

    #[test]
    fn test_weeks_and_months_are_fixed_day_counts() {
        let weeks = RelativeEndpoint {
            value: 2,
            unit: TimeUnit::Weeks,
            direction: Direction::Future,
        };
        assert_eq!(
            resolve_relative_date(&weeks, today()),
            NaiveDate::from_ymd_opt(2024, 3, 29)
        );
        let months = RelativeEndpoint {
            value: 1,
            unit: TimeUnit::Months,
            direction: Direction::Ago,
        };
        assert_eq!(
            resolve_relative_date(&months, today()),
            NaiveDate::from_ymd_opt(2024, 2, 14)
        );
    }

    #[test]
    fn test_out_of_range_endpoint_renders_placeholder() {
        let huge = RelativeEndpoint {
            value: u32::MAX,
            unit: TimeUnit::Months,
            direction: Direction::Future,
        };
        assert_eq!(resolved_label(&huge, today()), "?");
    }
}
