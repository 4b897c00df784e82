//! Segment builder: the controller UI events bind to.
//!
//! Owns the current group snapshot, the palette state (favorites and
//! collapsed categories), per-card tag input buffers, the drag engine and
//! the estimation overlay, and produces the submission payload.

use campaign_core::config::AppConfig;
use campaign_core::CampaignResult;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::{FieldCatalog, FieldCategory, FieldDefinition, ValueType};
use crate::conditions::{ConditionEdit, ConditionValue, RangeBound};
use crate::estimation::{EstimationMachine, ManualScheduler, StepScheduler, StepTick};
use crate::placement::{DropZoneRegistry, PlacementEngine, Point, Rect, RectZoneRegistry, ZoneId};
use crate::preview::preview;
use crate::store::{GroupId, GroupStore};

/// One OR-branch of the submitted segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupPayload {
    pub id: GroupId,
    pub name: String,
    /// Active fields only.
    pub conditions: BTreeMap<String, ConditionValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaletteSection<'a> {
    pub category: FieldCategory,
    pub collapsed: bool,
    pub fields: Vec<&'a FieldDefinition>,
}

/// The field library: favorites first, then each non-empty category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Palette<'a> {
    pub favorites: Vec<&'a FieldDefinition>,
    pub sections: Vec<PaletteSection<'a>>,
}

/// An active field as shown inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldCard {
    pub field_id: String,
    pub label: String,
    pub value_type: ValueType,
    pub collapsed: bool,
    pub preview: String,
}

pub struct SegmentBuilder<S: StepScheduler = ManualScheduler, Z: DropZoneRegistry = RectZoneRegistry> {
    store: GroupStore,
    favorites: Vec<String>,
    collapsed_categories: BTreeSet<FieldCategory>,
    tag_inputs: HashMap<(GroupId, String), String>,
    placement: PlacementEngine<Z>,
    estimation: EstimationMachine<S>,
}

impl SegmentBuilder {
    /// Builder over the stock catalog with a virtual-clock scheduler and
    /// rectangle drop zones.
    pub fn with_manual_clock(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(FieldCatalog::standard()),
            config,
            ManualScheduler::new(),
            RectZoneRegistry::new(),
        )
    }
}

impl<S: StepScheduler, Z: DropZoneRegistry> SegmentBuilder<S, Z> {
    pub fn new(catalog: Arc<FieldCatalog>, config: &AppConfig, scheduler: S, zones: Z) -> Self {
        Self {
            store: GroupStore::new(catalog, config.builder.initial_groups),
            favorites: Vec::new(),
            collapsed_categories: BTreeSet::new(),
            tag_inputs: HashMap::new(),
            placement: PlacementEngine::new(zones),
            estimation: EstimationMachine::new(scheduler, &config.estimation),
        }
    }

    pub fn store(&self) -> &GroupStore {
        &self.store
    }

    pub fn catalog(&self) -> &FieldCatalog {
        self.store.catalog()
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        self.store.group_ids()
    }

    // --- groups -----------------------------------------------------------

    pub fn add_group(&mut self) -> GroupId {
        self.store = self.store.add_group();
        let id = self
            .store
            .last_group_id()
            .unwrap_or_default();
        debug!(group_id = %id, groups = self.store.len(), "group added");
        id
    }

    pub fn remove_group(&mut self, group_id: GroupId) {
        let before = self.store.len();
        self.store = self.store.remove_group(group_id);
        if self.store.len() < before {
            self.tag_inputs.retain(|(g, _), _| *g != group_id);
            self.placement.unregister_drop_zone(ZoneId::Group(group_id));
        }
    }

    pub fn rename_group(&mut self, group_id: GroupId, name: &str) {
        self.store = self.store.rename_group(group_id, name);
    }

    pub fn add_field(&mut self, group_id: GroupId, field_id: &str) {
        self.store = self.store.add_field(group_id, field_id);
    }

    pub fn remove_field(&mut self, group_id: GroupId, field_id: &str) {
        self.store = self.store.remove_field(group_id, field_id);
        self.tag_inputs.remove(&(group_id, field_id.to_string()));
    }

    pub fn reorder_fields(&mut self, group_id: GroupId, new_order: &[String]) {
        self.store = self.store.reorder_fields(group_id, new_order);
    }

    pub fn set_condition_value(&mut self, group_id: GroupId, field_id: &str, value: ConditionValue) {
        self.store = self.store.set_condition_value(group_id, field_id, value);
    }

    pub fn apply_edit(&mut self, group_id: GroupId, field_id: &str, edit: &ConditionEdit) {
        self.store = self.store.apply_edit(group_id, field_id, edit);
    }

    pub fn set_range_bound(&mut self, group_id: GroupId, field_id: &str, bound: RangeBound, value: &str) {
        self.store = self.store.set_range_bound(group_id, field_id, bound, value);
    }

    pub fn toggle_field_collapse(&mut self, group_id: GroupId, field_id: &str) {
        self.store = self.store.toggle_field_collapse(group_id, field_id);
    }

    pub fn set_all_collapsed(&mut self, group_id: GroupId, collapsed: bool) {
        self.store = self.store.set_all_collapsed(group_id, collapsed);
    }

    // --- tag input buffers ------------------------------------------------

    pub fn set_tag_input(&mut self, group_id: GroupId, field_id: &str, text: &str) {
        self.tag_inputs
            .insert((group_id, field_id.to_string()), text.to_string());
    }

    pub fn tag_input(&self, group_id: GroupId, field_id: &str) -> &str {
        self.tag_inputs
            .get(&(group_id, field_id.to_string()))
            .map_or("", String::as_str)
    }

    /// Enter in a tag input: append the trimmed buffer as a tag and clear
    /// it. Blank buffers, and buffers on a field that does not hold tags,
    /// are left as they are. Returns whether a tag was added.
    pub fn commit_tag_input(&mut self, group_id: GroupId, field_id: &str) -> bool {
        let key = (group_id, field_id.to_string());
        let Some(text) = self.tag_inputs.get(&key) else {
            return false;
        };
        if text.trim().is_empty() {
            return false;
        }
        let before = match self.tag_values(group_id, field_id) {
            Some(tags) => tags.len(),
            None => {
                debug!(group_id = %group_id, field_id, "tag commit on a field without tags ignored");
                return false;
            }
        };

        let edit = ConditionEdit::AddTag { tag: text.clone() };
        self.store = self.store.apply_edit(group_id, field_id, &edit);
        let added = self
            .tag_values(group_id, field_id)
            .is_some_and(|tags| tags.len() > before);
        if added {
            self.tag_inputs.insert(key, String::new());
        }
        added
    }

    fn tag_values(&self, group_id: GroupId, field_id: &str) -> Option<&[String]> {
        match self.store.group(group_id)?.conditions.get(field_id)? {
            ConditionValue::Tags(tags) => Some(tags.as_slice()),
            _ => None,
        }
    }

    // --- palette ----------------------------------------------------------

    /// Add or remove a field from the favorites list.
    pub fn toggle_favorite(&mut self, field_id: &str) {
        if let Some(pos) = self.favorites.iter().position(|f| f == field_id) {
            self.favorites.remove(pos);
        } else {
            self.favorites.push(field_id.to_string());
        }
    }

    pub fn is_favorite(&self, field_id: &str) -> bool {
        self.favorites.iter().any(|f| f == field_id)
    }

    pub fn favorites(&self) -> &[String] {
        &self.favorites
    }

    pub fn toggle_category(&mut self, category: FieldCategory) {
        if !self.collapsed_categories.remove(&category) {
            self.collapsed_categories.insert(category);
        }
    }

    pub fn is_category_collapsed(&self, category: FieldCategory) -> bool {
        self.collapsed_categories.contains(&category)
    }

    pub fn palette(&self) -> Palette<'_> {
        let catalog = self.catalog();
        let favorites = self
            .favorites
            .iter()
            .filter_map(|id| catalog.get(id))
            .collect();
        let sections = FieldCategory::ALL
            .iter()
            .filter_map(|&category| {
                let fields: Vec<&FieldDefinition> = catalog.by_category(category).collect();
                (!fields.is_empty()).then(|| PaletteSection {
                    category,
                    collapsed: self.is_category_collapsed(category),
                    fields,
                })
            })
            .collect();
        Palette { favorites, sections }
    }

    /// Cards for a group's active fields in display order. Fields missing
    /// from the catalog are skipped.
    pub fn field_cards(&self, group_id: GroupId) -> Vec<FieldCard> {
        let Some(group) = self.store.group(group_id) else {
            return Vec::new();
        };
        let catalog = self.catalog();
        group
            .active_fields
            .iter()
            .filter_map(|field_id| {
                let field = catalog.get(field_id)?;
                let value = group.conditions.get(field_id).unwrap_or(&field.default_value);
                Some(FieldCard {
                    field_id: field_id.clone(),
                    label: field.label.clone(),
                    value_type: field.value_type,
                    collapsed: group.is_collapsed(field_id),
                    preview: preview(field, value),
                })
            })
            .collect()
    }

    // --- drag and drop ----------------------------------------------------

    pub fn placement(&self) -> &PlacementEngine<Z> {
        &self.placement
    }

    pub fn register_drop_zone(&mut self, id: ZoneId, rect: Rect) {
        self.placement.register_drop_zone(id, rect);
    }

    pub fn pick_up(&mut self, field_id: &str) {
        self.placement.on_pick_up(field_id);
    }

    /// Group under the pointer while dragging, for highlighting.
    pub fn drag_move(&mut self, point: Point) -> Option<GroupId> {
        self.placement.on_move(point)
    }

    /// Returns whether the drop resolved to a target.
    pub fn drop_at(&mut self, point: Point) -> bool {
        match self.placement.on_drop(point) {
            Some(placement) => {
                self.store = placement.apply(&self.store);
                true
            }
            None => false,
        }
    }

    /// Quick-add: a click on a palette token adds to the last group.
    pub fn click_field(&mut self, field_id: &str) {
        let placement = self.placement.click(field_id);
        self.store = placement.apply(&self.store);
    }

    // --- estimation -------------------------------------------------------

    pub fn estimation(&self) -> &EstimationMachine<S> {
        &self.estimation
    }

    pub fn estimation_mut(&mut self) -> &mut EstimationMachine<S> {
        &mut self.estimation
    }

    pub fn start_estimation(&mut self) {
        self.estimation.start();
    }

    pub fn on_estimation_tick(&mut self, tick: StepTick) -> bool {
        self.estimation.on_tick(tick)
    }

    pub fn close_estimation(&mut self, confirm: bool) {
        self.estimation.close(confirm);
    }

    // --- submission -------------------------------------------------------

    /// One entry per group with only its active fields' conditions.
    pub fn submit(&self) -> Vec<GroupPayload> {
        let payload: Vec<GroupPayload> = self
            .store
            .groups()
            .map(|g| GroupPayload {
                id: g.id,
                name: g.name.clone(),
                conditions: g.active_conditions(),
            })
            .collect();
        info!(
            groups = payload.len(),
            conditions = payload.iter().map(|g| g.conditions.len()).sum::<usize>(),
            "segment submitted"
        );
        payload
    }

    pub fn submit_json(&self) -> CampaignResult<String> {
        Ok(serde_json::to_string_pretty(&self.submit())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::RangeValue;
    use serde_json::json;

    fn builder() -> SegmentBuilder {
        SegmentBuilder::with_manual_clock(&AppConfig::default())
    }

    #[test]
    fn test_submit_filters_inactive_fields() {
        let mut b = builder();
        let g = b.group_ids()[0];
        b.add_field(g, "user_type");
        b.add_field(g, "region");
        b.set_condition_value(g, "age_range", ConditionValue::Range(RangeValue {
            min: "18".into(),
            max: "30".into(),
        }));

        let payload = b.submit();
        let keys: Vec<&String> = payload[0].conditions.keys().collect();
        assert_eq!(keys, vec!["region", "user_type"]);
    }

    #[test]
    fn test_removed_field_drops_out_of_payload() {
        let mut b = builder();
        let g = b.group_ids()[0];
        b.add_field(g, "user_type");
        b.remove_field(g, "user_type");
        assert!(b.submit()[0].conditions.is_empty());
    }

    #[test]
    fn test_submit_json_shape() {
        let mut b = builder();
        let g = b.group_ids()[0];
        b.add_field(g, "user_type");
        b.set_condition_value(g, "user_type", ConditionValue::Select("premium".into()));

        let json: serde_json::Value = serde_json::from_str(&b.submit_json().unwrap()).unwrap();
        assert_eq!(
            json,
            json!([{
                "id": g.to_string(),
                "name": "Segment Group 1",
                "conditions": {"user_type": "premium"}
            }])
        );
    }

    #[test]
    fn test_favorites_toggle_and_palette() {
        let mut b = builder();
        b.toggle_favorite("region");
        b.toggle_favorite("user_type");
        b.toggle_favorite("ghost");
        assert!(b.is_favorite("region"));

        let palette = b.palette();
        let favs: Vec<&str> = palette.favorites.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(favs, vec!["region", "user_type"]);

        b.toggle_favorite("region");
        assert!(!b.is_favorite("region"));
        assert_eq!(b.favorites(), &["user_type".to_string(), "ghost".to_string()]);
    }

    #[test]
    fn test_category_collapse() {
        let mut b = builder();
        b.toggle_category(FieldCategory::Demographics);
        let palette = b.palette();
        let cats: Vec<(FieldCategory, bool)> = palette
            .sections
            .iter()
            .map(|s| (s.category, s.collapsed))
            .collect();
        assert_eq!(
            cats,
            vec![
                (FieldCategory::Attributes, false),
                (FieldCategory::Demographics, true),
                (FieldCategory::Activity, false),
            ]
        );
        b.toggle_category(FieldCategory::Demographics);
        assert!(!b.is_category_collapsed(FieldCategory::Demographics));
    }

    #[test]
    fn test_tag_input_commit() {
        let mut b = builder();
        let g = b.group_ids()[0];
        b.add_field(g, "custom_tags");

        b.set_tag_input(g, "custom_tags", "   ");
        assert!(!b.commit_tag_input(g, "custom_tags"));

        b.set_tag_input(g, "custom_tags", "  vip ");
        assert!(b.commit_tag_input(g, "custom_tags"));
        assert_eq!(b.tag_input(g, "custom_tags"), "");
        assert_eq!(
            b.submit()[0].conditions["custom_tags"],
            ConditionValue::Tags(vec!["vip".into()])
        );
    }

    #[test]
    fn test_tag_commit_on_non_tag_field_keeps_buffer() {
        let mut b = builder();
        let g = b.group_ids()[0];
        b.add_field(g, "user_type");

        b.set_tag_input(g, "user_type", "vip");
        assert!(!b.commit_tag_input(g, "user_type"));
        assert_eq!(b.tag_input(g, "user_type"), "vip");
        assert_eq!(
            b.submit()[0].conditions["user_type"],
            ConditionValue::Select("all".into())
        );

        let missing = GroupId::new();
        b.set_tag_input(missing, "custom_tags", "vip");
        assert!(!b.commit_tag_input(missing, "custom_tags"));
        assert_eq!(b.tag_input(missing, "custom_tags"), "vip");
    }

    #[test]
    fn test_field_cards_show_previews() {
        let mut b = builder();
        let g = b.group_ids()[0];
        b.add_field(g, "region");
        b.add_field(g, "user_type");
        b.toggle_field_collapse(g, "region");

        let cards = b.field_cards(g);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].field_id, "region");
        assert!(cards[0].collapsed);
        assert_eq!(cards[0].preview, "Japan");
        assert_eq!(cards[1].preview, "All Users");
        assert!(!cards[1].collapsed);
    }

    #[test]
    fn test_click_and_drop_placement() {
        let mut b = builder();
        let g1 = b.group_ids()[0];
        let g2 = b.add_group();
        b.register_drop_zone(ZoneId::Canvas, Rect::new(0.0, 0.0, 500.0, 500.0));
        b.register_drop_zone(ZoneId::Group(g1), Rect::new(10.0, 10.0, 100.0, 100.0));
        b.register_drop_zone(ZoneId::Group(g2), Rect::new(10.0, 200.0, 100.0, 100.0));

        b.click_field("user_type");
        assert!(b.store().group(g2).unwrap().is_active("user_type"));

        b.pick_up("region");
        assert_eq!(b.drag_move(Point::new(20.0, 20.0)), Some(g1));
        assert!(b.drop_at(Point::new(20.0, 20.0)));
        assert!(b.store().group(g1).unwrap().is_active("region"));

        b.pick_up("description");
        assert!(!b.drop_at(Point::new(900.0, 900.0)));
        assert!(b.store().groups().all(|g| !g.is_active("description")));
    }

    #[test]
    fn test_remove_group_clears_zone_and_buffers() {
        let mut b = builder();
        let g2 = b.add_group();
        b.register_drop_zone(ZoneId::Group(g2), Rect::new(0.0, 0.0, 10.0, 10.0));
        b.set_tag_input(g2, "custom_tags", "x");
        b.remove_group(g2);
        assert_eq!(b.store().len(), 1);
        assert_eq!(b.tag_input(g2, "custom_tags"), "");
        assert_eq!(b.placement().zones().hit_test(Point::new(5.0, 5.0)), None);
    }

    #[test]
    fn test_estimation_confirm_flow() {
        let mut b = builder();
        b.start_estimation();
        b.estimation_mut().advance(std::time::Duration::from_secs(5));
        let result = b.estimation().result().map(str::to_string);
        assert!(result.is_some());
        b.close_estimation(true);
        assert_eq!(b.estimation().confirmed_audience().map(str::to_string), result);
    }
}
