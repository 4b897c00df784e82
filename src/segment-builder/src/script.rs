//! Scripted UI events replayed against a [`SegmentBuilder`].
//!
//! Groups are addressed by their position in display order at the time the
//! command runs, since group ids are generated.

use campaign_core::config::AppConfig;
use campaign_core::{CampaignError, CampaignResult};
use campaign_segmentation::conditions::{ConditionEdit, ConditionValue};
use campaign_segmentation::estimation::{EstimationPhase, StepTick, TokioScheduler};
use campaign_segmentation::placement::{Point, Rect, ZoneId};
use campaign_segmentation::{FieldCatalog, FieldCategory, GroupId, SegmentBuilder};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Command {
    AddGroup,
    RemoveGroup { group: usize },
    RenameGroup { group: usize, name: String },
    AddField { group: usize, field: String },
    RemoveField { group: usize, field: String },
    Reorder { group: usize, order: Vec<String> },
    /// Bare JSON value, parsed according to the field's type.
    SetValue { group: usize, field: String, value: serde_json::Value },
    Edit { group: usize, field: String, edit: ConditionEdit },
    ToggleCollapse { group: usize, field: String },
    CollapseAll { group: usize, collapsed: bool },
    ToggleFavorite { field: String },
    ToggleCategory { category: FieldCategory },
    TagInput { group: usize, field: String, text: String },
    CommitTag { group: usize, field: String },
    /// Register a drop zone; no `group` means the canvas.
    Zone {
        #[serde(default)]
        group: Option<usize>,
        rect: Rect,
    },
    Click { field: String },
    PickUp { field: String },
    Move { x: f64, y: f64 },
    Drop { x: f64, y: f64 },
    /// Run an estimation to completion, or close it early after
    /// `close_after_ms`.
    Estimate {
        #[serde(default)]
        confirm: bool,
        #[serde(default)]
        close_after_ms: Option<u64>,
    },
}

pub fn load_script(path: &Path) -> CampaignResult<Vec<Command>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Built-in walkthrough used when no script is given.
pub fn demo_script() -> Vec<Command> {
    vec![
        Command::AddField {
            group: 0,
            field: "user_type".into(),
        },
        Command::SetValue {
            group: 0,
            field: "user_type".into(),
            value: serde_json::json!("premium"),
        },
        Command::AddGroup,
        Command::Click {
            field: "region".into(),
        },
        Command::Edit {
            group: 1,
            field: "region".into(),
            edit: ConditionEdit::ToggleOption {
                option: "us".into(),
            },
        },
        Command::Estimate {
            confirm: true,
            close_after_ms: None,
        },
    ]
}

pub struct ScriptRunner {
    builder: SegmentBuilder<TokioScheduler>,
    ticks: UnboundedReceiver<StepTick>,
}

impl ScriptRunner {
    pub fn new(config: &AppConfig) -> Self {
        let (scheduler, ticks) = TokioScheduler::new();
        let builder = SegmentBuilder::new(
            Arc::new(FieldCatalog::standard()),
            config,
            scheduler,
            Default::default(),
        );
        Self { builder, ticks }
    }

    pub fn builder(&self) -> &SegmentBuilder<TokioScheduler> {
        &self.builder
    }

    pub async fn run(&mut self, commands: &[Command]) -> CampaignResult<()> {
        for (i, command) in commands.iter().enumerate() {
            debug!(index = i, ?command, "applying command");
            self.apply(command).await?;
        }
        Ok(())
    }

    pub async fn apply(&mut self, command: &Command) -> CampaignResult<()> {
        let b = &mut self.builder;
        match command {
            Command::AddGroup => {
                b.add_group();
            }
            Command::RemoveGroup { group } => {
                let g = group_at(b, *group)?;
                b.remove_group(g);
            }
            Command::RenameGroup { group, name } => {
                let g = group_at(b, *group)?;
                b.rename_group(g, name);
            }
            Command::AddField { group, field } => {
                let g = group_at(b, *group)?;
                b.add_field(g, field);
            }
            Command::RemoveField { group, field } => {
                let g = group_at(b, *group)?;
                b.remove_field(g, field);
            }
            Command::Reorder { group, order } => {
                let g = group_at(b, *group)?;
                b.reorder_fields(g, order);
            }
            Command::SetValue { group, field, value } => {
                let g = group_at(b, *group)?;
                let value_type = b
                    .catalog()
                    .get(field)
                    .map(|f| f.value_type)
                    .ok_or_else(|| CampaignError::Validation(format!("unknown field '{field}'")))?;
                let value = ConditionValue::from_json(value_type, value.clone())?;
                b.set_condition_value(g, field, value);
            }
            Command::Edit { group, field, edit } => {
                let g = group_at(b, *group)?;
                b.apply_edit(g, field, edit);
            }
            Command::ToggleCollapse { group, field } => {
                let g = group_at(b, *group)?;
                b.toggle_field_collapse(g, field);
            }
            Command::CollapseAll { group, collapsed } => {
                let g = group_at(b, *group)?;
                b.set_all_collapsed(g, *collapsed);
            }
            Command::ToggleFavorite { field } => b.toggle_favorite(field),
            Command::ToggleCategory { category } => b.toggle_category(*category),
            Command::TagInput { group, field, text } => {
                let g = group_at(b, *group)?;
                b.set_tag_input(g, field, text);
            }
            Command::CommitTag { group, field } => {
                let g = group_at(b, *group)?;
                b.commit_tag_input(g, field);
            }
            Command::Zone { group, rect } => {
                let zone = match group {
                    Some(index) => ZoneId::Group(group_at(b, *index)?),
                    None => ZoneId::Canvas,
                };
                b.register_drop_zone(zone, *rect);
            }
            Command::Click { field } => b.click_field(field),
            Command::PickUp { field } => b.pick_up(field),
            Command::Move { x, y } => {
                let hovered = b.drag_move(Point::new(*x, *y));
                debug!(?hovered, "drag move");
            }
            Command::Drop { x, y } => {
                if !b.drop_at(Point::new(*x, *y)) {
                    info!(x, y, "drop cancelled");
                }
            }
            Command::Estimate {
                confirm,
                close_after_ms,
            } => self.estimate(*confirm, *close_after_ms).await?,
        }
        Ok(())
    }

    async fn estimate(&mut self, confirm: bool, close_after_ms: Option<u64>) -> CampaignResult<()> {
        self.builder.start_estimation();

        let deadline = close_after_ms
            .map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));

        while self.builder.estimation().phase() == EstimationPhase::Running {
            let tick = match deadline {
                Some(deadline) => {
                    tokio::select! {
                        tick = self.ticks.recv() => tick,
                        _ = tokio::time::sleep_until(deadline) => {
                            info!(
                                step = self.builder.estimation().step_index(),
                                "estimation closed before completion"
                            );
                            break;
                        }
                    }
                }
                None => self.ticks.recv().await,
            };
            let tick = tick.ok_or_else(|| {
                CampaignError::Internal(anyhow::anyhow!("estimation timer channel closed"))
            })?;
            if self.builder.on_estimation_tick(tick) {
                info!(
                    step = tick.step,
                    label = self.builder.estimation().step_label(),
                    "estimation progress"
                );
            }
        }

        self.builder.close_estimation(confirm);
        Ok(())
    }
}

fn group_at(builder: &SegmentBuilder<TokioScheduler>, index: usize) -> CampaignResult<GroupId> {
    builder
        .group_ids()
        .get(index)
        .copied()
        .ok_or_else(|| CampaignError::Validation(format!("no group at position {index}")))
}
