//! Drag-and-drop placement: resolves a dragged catalog field to the group
//! it should be added to.
//!
//! Pointer hit-testing goes through [`DropZoneRegistry`] so the engine runs
//! without a real pointer or layout environment.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::{GroupId, GroupStore};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Left and top edges are inside, right and bottom edges are not.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }
}

/// Drop target identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneId {
    /// A specific group's card.
    Group(GroupId),
    /// The canvas surrounding the groups.
    Canvas,
}

/// Hit-testing capability for drop targets.
pub trait DropZoneRegistry {
    /// Register or move a zone. Re-registering an id replaces its rect.
    fn register_drop_zone(&mut self, id: ZoneId, rect: Rect);

    fn unregister_drop_zone(&mut self, id: ZoneId);

    /// Most specific zone under `point`: a group zone wins over the canvas.
    fn hit_test(&self, point: Point) -> Option<ZoneId>;
}

/// Registry over plain rectangles. Among overlapping group zones the most
/// recently registered one wins.
#[derive(Debug, Clone, Default)]
pub struct RectZoneRegistry {
    zones: Vec<(ZoneId, Rect)>,
}

impl RectZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

impl DropZoneRegistry for RectZoneRegistry {
    fn register_drop_zone(&mut self, id: ZoneId, rect: Rect) {
        self.zones.retain(|(z, _)| *z != id);
        self.zones.push((id, rect));
    }

    fn unregister_drop_zone(&mut self, id: ZoneId) {
        self.zones.retain(|(z, _)| *z != id);
    }

    fn hit_test(&self, point: Point) -> Option<ZoneId> {
        let mut canvas_hit = false;
        for (id, rect) in self.zones.iter().rev() {
            if !rect.contains(point) {
                continue;
            }
            match id {
                ZoneId::Group(_) => return Some(*id),
                ZoneId::Canvas => canvas_hit = true,
            }
        }
        canvas_hit.then_some(ZoneId::Canvas)
    }
}

/// Where a placed field goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementTarget {
    Group(GroupId),
    /// The last group in display order.
    LastGroup,
}

/// A resolved drop or quick-add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub field_id: String,
    pub target: PlacementTarget,
}

impl Placement {
    /// Add the field to its target group. A group that has disappeared
    /// since its zone was registered falls back to the last group.
    pub fn apply(&self, store: &GroupStore) -> GroupStore {
        match self.target {
            PlacementTarget::Group(id) if store.group(id).is_some() => {
                store.add_field(id, &self.field_id)
            }
            PlacementTarget::Group(id) => {
                debug!(group_id = %id, "drop zone refers to a removed group, using last group");
                store.add_field_to_last(&self.field_id)
            }
            PlacementTarget::LastGroup => store.add_field_to_last(&self.field_id),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlacementEngine<Z = RectZoneRegistry> {
    zones: Z,
    dragging: Option<String>,
    hovered: Option<GroupId>,
}

impl<Z: DropZoneRegistry> PlacementEngine<Z> {
    pub fn new(zones: Z) -> Self {
        Self {
            zones,
            dragging: None,
            hovered: None,
        }
    }

    pub fn zones(&self) -> &Z {
        &self.zones
    }

    pub fn zones_mut(&mut self) -> &mut Z {
        &mut self.zones
    }

    pub fn register_drop_zone(&mut self, id: ZoneId, rect: Rect) {
        self.zones.register_drop_zone(id, rect);
    }

    pub fn unregister_drop_zone(&mut self, id: ZoneId) {
        self.zones.unregister_drop_zone(id);
        if let (ZoneId::Group(gid), Some(h)) = (id, self.hovered) {
            if gid == h {
                self.hovered = None;
            }
        }
    }

    /// Field currently being dragged, if any.
    pub fn dragging(&self) -> Option<&str> {
        self.dragging.as_deref()
    }

    /// Group to highlight while dragging.
    pub fn hovered(&self) -> Option<GroupId> {
        self.hovered
    }

    pub fn on_pick_up(&mut self, field_id: &str) {
        self.dragging = Some(field_id.to_string());
        self.hovered = None;
    }

    /// Update the hovered group. Hit-testing only, never touches the store.
    pub fn on_move(&mut self, point: Point) -> Option<GroupId> {
        if self.dragging.is_none() {
            return None;
        }
        self.hovered = match self.zones.hit_test(point) {
            Some(ZoneId::Group(id)) => Some(id),
            _ => None,
        };
        self.hovered
    }

    /// Finish the drag. `None` means the drop landed outside every zone
    /// (or nothing was being dragged) and nothing should change.
    pub fn on_drop(&mut self, point: Point) -> Option<Placement> {
        self.hovered = None;
        let field_id = self.dragging.take()?;
        let target = match self.zones.hit_test(point) {
            Some(ZoneId::Group(id)) => PlacementTarget::Group(id),
            Some(ZoneId::Canvas) => PlacementTarget::LastGroup,
            None => {
                debug!(field_id = %field_id, x = point.x, y = point.y, "drop outside any zone, cancelled");
                return None;
            }
        };
        Some(Placement { field_id, target })
    }

    /// Abandon the current drag without placing anything.
    pub fn cancel(&mut self) {
        self.dragging = None;
        self.hovered = None;
    }

    /// A plain click on a palette token: same as dropping on the canvas.
    pub fn click(&self, field_id: &str) -> Placement {
        Placement {
            field_id: field_id.to_string(),
            target: PlacementTarget::LastGroup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldCatalog;
    use std::sync::Arc;

    /// Canvas 0..1000 x 0..1000 with two stacked group cards inside.
    fn layout(g1: GroupId, g2: GroupId) -> PlacementEngine {
        let mut engine = PlacementEngine::default();
        engine.register_drop_zone(ZoneId::Canvas, Rect::new(0.0, 0.0, 1000.0, 1000.0));
        engine.register_drop_zone(ZoneId::Group(g1), Rect::new(100.0, 100.0, 800.0, 200.0));
        engine.register_drop_zone(ZoneId::Group(g2), Rect::new(100.0, 400.0, 800.0, 200.0));
        engine
    }

    #[test]
    fn test_rect_contains_edges() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(Point::new(0.0, 0.0)));
        assert!(!r.contains(Point::new(10.0, 5.0)));
    }

    #[test]
    fn test_hit_test_prefers_group_over_canvas() {
        let (g1, g2) = (GroupId::new(), GroupId::new());
        let engine = layout(g1, g2);
        assert_eq!(engine.zones().hit_test(Point::new(150.0, 150.0)), Some(ZoneId::Group(g1)));
        assert_eq!(engine.zones().hit_test(Point::new(150.0, 450.0)), Some(ZoneId::Group(g2)));
        assert_eq!(engine.zones().hit_test(Point::new(50.0, 50.0)), Some(ZoneId::Canvas));
        assert_eq!(engine.zones().hit_test(Point::new(2000.0, 50.0)), None);
    }

    #[test]
    fn test_reregister_replaces_rect() {
        let mut zones = RectZoneRegistry::new();
        let g = GroupId::new();
        zones.register_drop_zone(ZoneId::Group(g), Rect::new(0.0, 0.0, 10.0, 10.0));
        zones.register_drop_zone(ZoneId::Group(g), Rect::new(50.0, 50.0, 10.0, 10.0));
        assert_eq!(zones.len(), 1);
        assert_eq!(zones.hit_test(Point::new(5.0, 5.0)), None);
        assert_eq!(zones.hit_test(Point::new(55.0, 55.0)), Some(ZoneId::Group(g)));
    }

    #[test]
    fn test_move_reports_hovered_group() {
        let (g1, g2) = (GroupId::new(), GroupId::new());
        let mut engine = layout(g1, g2);
        // not dragging: nothing hovered
        assert_eq!(engine.on_move(Point::new(150.0, 150.0)), None);

        engine.on_pick_up("region");
        assert_eq!(engine.on_move(Point::new(150.0, 150.0)), Some(g1));
        assert_eq!(engine.on_move(Point::new(150.0, 450.0)), Some(g2));
        assert_eq!(engine.on_move(Point::new(50.0, 50.0)), None);
        assert_eq!(engine.hovered(), None);
    }

    #[test]
    fn test_drop_resolution() {
        let (g1, g2) = (GroupId::new(), GroupId::new());
        let mut engine = layout(g1, g2);

        engine.on_pick_up("region");
        let p = engine.on_drop(Point::new(150.0, 150.0)).unwrap();
        assert_eq!(p.target, PlacementTarget::Group(g1));
        assert_eq!(p.field_id, "region");
        assert!(engine.dragging().is_none());

        engine.on_pick_up("region");
        let p = engine.on_drop(Point::new(10.0, 10.0)).unwrap();
        assert_eq!(p.target, PlacementTarget::LastGroup);

        engine.on_pick_up("region");
        engine.on_move(Point::new(150.0, 150.0));
        assert!(engine.on_drop(Point::new(5000.0, 10.0)).is_none());
        assert_eq!(engine.hovered(), None);
    }

    #[test]
    fn test_drop_without_pick_up_is_ignored() {
        let (g1, g2) = (GroupId::new(), GroupId::new());
        let mut engine = layout(g1, g2);
        assert!(engine.on_drop(Point::new(150.0, 150.0)).is_none());
    }

    #[test]
    fn test_click_targets_last_group() {
        let engine: PlacementEngine = PlacementEngine::default();
        assert_eq!(engine.click("user_type").target, PlacementTarget::LastGroup);
    }

    #[test]
    fn test_apply_placement_to_store() {
        let store = GroupStore::new(Arc::new(FieldCatalog::standard()), 2);
        let ids = store.group_ids();

        let p = Placement {
            field_id: "region".into(),
            target: PlacementTarget::Group(ids[0]),
        };
        let next = p.apply(&store);
        assert_eq!(next.group(ids[0]).unwrap().active_fields, vec!["region".to_string()]);

        let stale = Placement {
            field_id: "user_type".into(),
            target: PlacementTarget::Group(GroupId::new()),
        };
        let next = stale.apply(&next);
        assert_eq!(next.group(ids[1]).unwrap().active_fields, vec!["user_type".to_string()]);
    }
}
