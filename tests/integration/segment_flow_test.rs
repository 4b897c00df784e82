//! End-to-end segment builder flows: building groups, submitting, and
//! estimating, through the public controller surface.

#[cfg(test)]
mod tests {
    use campaign_core::config::AppConfig;
    use campaign_segmentation::conditions::{
        ConditionEdit, DateMode, Endpoint, EndpointEdit, RelativeEndpoint, TimeUnit,
    };
    use campaign_segmentation::estimation::EstimationPhase;
    use campaign_segmentation::placement::{Point, Rect, ZoneId};
    use campaign_segmentation::{ConditionValue, SegmentBuilder};
    use segment_builder::{Command, ScriptRunner};
    use serde_json::json;
    use std::time::Duration;

    fn builder() -> SegmentBuilder {
        SegmentBuilder::with_manual_clock(&AppConfig::default())
    }

    #[test]
    fn test_single_group_premium_users() {
        let mut b = builder();
        let g1 = b.group_ids()[0];
        b.add_field(g1, "user_type");
        b.set_condition_value(g1, "user_type", ConditionValue::Select("premium".into()));

        let payload = serde_json::to_value(b.submit()).unwrap();
        assert_eq!(
            payload,
            json!([{
                "id": g1.to_string(),
                "name": "Segment Group 1",
                "conditions": {"user_type": "premium"}
            }])
        );
    }

    #[test]
    fn test_two_groups_second_empty() {
        let mut b = builder();
        let g1 = b.group_ids()[0];
        let g2 = b.add_group();
        b.add_field(g1, "region");
        b.set_condition_value(g1, "region", ConditionValue::checkbox(["jp", "us"]));

        let payload = serde_json::to_value(b.submit()).unwrap();
        assert_eq!(
            payload,
            json!([
                {
                    "id": g1.to_string(),
                    "name": "Segment Group 1",
                    "conditions": {"region": ["jp", "us"]}
                },
                {
                    "id": g2.to_string(),
                    "name": "Segment Group 2",
                    "conditions": {}
                }
            ])
        );
    }

    #[test]
    fn test_drag_into_specific_group_and_edit_date() {
        let mut b = builder();
        let g1 = b.group_ids()[0];
        let g2 = b.add_group();
        b.register_drop_zone(ZoneId::Canvas, Rect::new(0.0, 0.0, 800.0, 800.0));
        b.register_drop_zone(ZoneId::Group(g1), Rect::new(50.0, 50.0, 700.0, 300.0));
        b.register_drop_zone(ZoneId::Group(g2), Rect::new(50.0, 400.0, 700.0, 300.0));

        b.pick_up("signup_date");
        assert_eq!(b.drag_move(Point::new(60.0, 60.0)), Some(g1));
        assert!(b.drop_at(Point::new(60.0, 60.0)));

        b.apply_edit(g1, "signup_date", &ConditionEdit::SetDateMode { mode: DateMode::Relative });
        b.apply_edit(
            g1,
            "signup_date",
            &ConditionEdit::SetCustomEndpoint {
                endpoint: Endpoint::From,
                change: EndpointEdit::Unit(TimeUnit::Weeks),
            },
        );

        let payload = b.submit();
        assert!(payload[1].conditions.is_empty());
        let ConditionValue::Date(date) = &payload[0].conditions["signup_date"] else {
            panic!("expected a date condition");
        };
        assert_eq!(date.relative.custom.from.unit, TimeUnit::Weeks);
        assert_eq!(date.relative.custom.to, RelativeEndpoint::days_ago(0));

        let cards = b.field_cards(g1);
        assert!(cards[0].preview.ends_with("(Custom)"));
    }

    #[test]
    fn test_estimation_restart_through_builder() {
        let mut b = builder();
        b.start_estimation();
        b.estimation_mut().advance(Duration::from_millis(3600));
        assert_eq!(b.estimation().step_index(), 3);

        b.start_estimation();
        assert_eq!(b.estimation().step_index(), 0);
        b.estimation_mut().advance(Duration::from_millis(1500));
        assert_eq!(b.estimation().step_index(), 1);

        b.estimation_mut().advance(Duration::from_millis(3500));
        assert_eq!(b.estimation().phase(), EstimationPhase::Done);

        b.close_estimation(false);
        assert!(b.estimation().confirmed_audience().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_cancels_estimation_early() {
        let mut runner = ScriptRunner::new(&AppConfig::default());
        runner
            .run(&[
                Command::AddField {
                    group: 0,
                    field: "description".into(),
                },
                Command::SetValue {
                    group: 0,
                    field: "description".into(),
                    value: json!("spring sale"),
                },
                Command::Estimate {
                    confirm: true,
                    close_after_ms: Some(2000),
                },
            ])
            .await
            .unwrap();

        let builder = runner.builder();
        assert_eq!(builder.estimation().phase(), EstimationPhase::Idle);
        assert!(builder.estimation().confirmed_audience().is_none());
        assert_eq!(builder.field_cards(builder.group_ids()[0])[0].preview, "Contains \"spring sale\"");
    }
}
