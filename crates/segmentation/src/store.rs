//! Condition group store: the OR-ed list of AND-groups being edited.
//!
//! Every operation returns a new snapshot and leaves `self` untouched.
//! Groups are shared between snapshots and copied on write. Unknown group
//! or field ids turn an operation into a no-op.

use campaign_core::{CampaignError, CampaignResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::catalog::FieldCatalog;
use crate::conditions::{ConditionEdit, ConditionValue, RangeBound};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(Uuid);

impl GroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for GroupId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A set of AND-ed field conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionGroup {
    pub id: GroupId,
    pub name: String,
    /// Value for every catalog field, seeded from the catalog defaults.
    pub conditions: BTreeMap<String, ConditionValue>,
    /// Fields shown in this group, in display (and AND) order.
    pub active_fields: Vec<String>,
    /// Subset of `active_fields` rendered as one-line previews.
    pub collapsed_fields: BTreeSet<String>,
}

impl ConditionGroup {
    /// New group named after its 1-based position, with every catalog
    /// default in place and no active fields.
    pub fn new(catalog: &FieldCatalog, existing_count: usize) -> Self {
        let conditions = catalog
            .fields()
            .iter()
            .map(|f| (f.id.clone(), f.default_value.clone()))
            .collect();
        Self {
            id: GroupId::new(),
            name: format!("Segment Group {}", existing_count + 1),
            conditions,
            active_fields: Vec::new(),
            collapsed_fields: BTreeSet::new(),
        }
    }

    pub fn is_active(&self, field_id: &str) -> bool {
        self.active_fields.iter().any(|f| f == field_id)
    }

    pub fn is_collapsed(&self, field_id: &str) -> bool {
        self.collapsed_fields.contains(field_id)
    }

    /// Conditions of the active fields only, keyed by field id.
    pub fn active_conditions(&self) -> BTreeMap<String, ConditionValue> {
        self.active_fields
            .iter()
            .filter_map(|f| self.conditions.get(f).map(|v| (f.clone(), v.clone())))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct GroupStore {
    catalog: Arc<FieldCatalog>,
    groups: Vec<Arc<ConditionGroup>>,
}

impl GroupStore {
    /// Store holding `initial_groups` fresh groups (at least one).
    pub fn new(catalog: Arc<FieldCatalog>, initial_groups: usize) -> Self {
        let groups = (0..initial_groups.max(1))
            .map(|i| Arc::new(ConditionGroup::new(&catalog, i)))
            .collect();
        Self { catalog, groups }
    }

    pub fn catalog(&self) -> &Arc<FieldCatalog> {
        &self.catalog
    }

    pub fn groups(&self) -> impl Iterator<Item = &ConditionGroup> {
        self.groups.iter().map(|g| g.as_ref())
    }

    pub fn group(&self, id: GroupId) -> Option<&ConditionGroup> {
        self.groups.iter().find(|g| g.id == id).map(|g| g.as_ref())
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.iter().map(|g| g.id).collect()
    }

    pub fn last_group_id(&self) -> Option<GroupId> {
        self.groups.last().map(|g| g.id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Append `field_id` to the group's active fields unless already there.
    #[must_use]
    pub fn add_field(&self, group_id: GroupId, field_id: &str) -> Self {
        if !self.catalog.contains(field_id) {
            debug!(field_id, "add_field: unknown field");
            return self.clone();
        }
        self.update_group(group_id, |g| {
            if !g.is_active(field_id) {
                g.active_fields.push(field_id.to_string());
            }
        })
    }

    /// `add_field` against the last group in display order.
    #[must_use]
    pub fn add_field_to_last(&self, field_id: &str) -> Self {
        match self.last_group_id() {
            Some(id) => self.add_field(id, field_id),
            None => self.clone(),
        }
    }

    #[must_use]
    pub fn remove_field(&self, group_id: GroupId, field_id: &str) -> Self {
        self.update_group(group_id, |g| {
            g.active_fields.retain(|f| f != field_id);
            g.collapsed_fields.remove(field_id);
        })
    }

    /// Replace the active field order. `new_order` must be a permutation
    /// of the current active fields.
    pub fn try_reorder_fields(&self, group_id: GroupId, new_order: &[String]) -> CampaignResult<Self> {
        let Some(group) = self.group(group_id) else {
            debug!(%group_id, "reorder_fields: unknown group");
            return Ok(self.clone());
        };
        if !is_permutation(&group.active_fields, new_order) {
            return Err(CampaignError::Validation(format!(
                "reorder of group {group_id} is not a permutation of {:?}: {:?}",
                group.active_fields, new_order
            )));
        }
        Ok(self.update_group(group_id, |g| g.active_fields = new_order.to_vec()))
    }

    /// Like `try_reorder_fields`, but an invalid order keeps the prior one.
    #[must_use]
    pub fn reorder_fields(&self, group_id: GroupId, new_order: &[String]) -> Self {
        self.try_reorder_fields(group_id, new_order)
            .unwrap_or_else(|e| {
                warn!(error = %e, "rejected field reorder");
                self.clone()
            })
    }

    /// Replace a field's value. The value is not checked against the
    /// field's declared type.
    #[must_use]
    pub fn set_condition_value(&self, group_id: GroupId, field_id: &str, value: ConditionValue) -> Self {
        if !self.catalog.contains(field_id) {
            debug!(field_id, "set_condition_value: unknown field");
            return self.clone();
        }
        self.update_group(group_id, |g| {
            g.conditions.insert(field_id.to_string(), value);
        })
    }

    /// Apply an editor interaction to a field's current value.
    #[must_use]
    pub fn apply_edit(&self, group_id: GroupId, field_id: &str, edit: &ConditionEdit) -> Self {
        let Some(field) = self.catalog.get(field_id) else {
            debug!(field_id, "apply_edit: unknown field");
            return self.clone();
        };
        self.update_group(group_id, |g| {
            let current = g
                .conditions
                .get(field_id)
                .unwrap_or(&field.default_value);
            let next = current.apply(edit);
            g.conditions.insert(field_id.to_string(), next);
        })
    }

    /// Set one bound of a range value, keeping the other.
    #[must_use]
    pub fn set_range_bound(&self, group_id: GroupId, field_id: &str, bound: RangeBound, value: &str) -> Self {
        self.apply_edit(
            group_id,
            field_id,
            &ConditionEdit::SetRangeBound {
                bound,
                value: value.to_string(),
            },
        )
    }

    #[must_use]
    pub fn rename_group(&self, group_id: GroupId, name: &str) -> Self {
        self.update_group(group_id, |g| g.name = name.to_string())
    }

    /// Flip the collapsed state of an active field.
    #[must_use]
    pub fn toggle_field_collapse(&self, group_id: GroupId, field_id: &str) -> Self {
        self.update_group(group_id, |g| {
            if !g.is_active(field_id) {
                return;
            }
            if !g.collapsed_fields.remove(field_id) {
                g.collapsed_fields.insert(field_id.to_string());
            }
        })
    }

    /// Collapse every active field, or expand them all.
    #[must_use]
    pub fn set_all_collapsed(&self, group_id: GroupId, collapsed: bool) -> Self {
        self.update_group(group_id, |g| {
            g.collapsed_fields = if collapsed {
                g.active_fields.iter().cloned().collect()
            } else {
                BTreeSet::new()
            };
        })
    }

    #[must_use]
    pub fn add_group(&self) -> Self {
        let mut next = self.clone();
        let group = ConditionGroup::new(&self.catalog, self.groups.len());
        next.groups.push(Arc::new(group));
        next
    }

    /// Remove a group. The sole remaining group is never removed.
    #[must_use]
    pub fn remove_group(&self, group_id: GroupId) -> Self {
        if self.groups.len() <= 1 {
            debug!(%group_id, "remove_group: refusing to remove the last group");
            return self.clone();
        }
        let mut next = self.clone();
        next.groups.retain(|g| g.id != group_id);
        next
    }

    fn update_group(&self, group_id: GroupId, f: impl FnOnce(&mut ConditionGroup)) -> Self {
        let mut next = self.clone();
        match next.groups.iter_mut().find(|g| g.id == group_id) {
            Some(group) => f(Arc::make_mut(group)),
            None => debug!(%group_id, "unknown group"),
        }
        next
    }
}

fn is_permutation(current: &[String], proposed: &[String]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }
    let current: HashSet<&String> = current.iter().collect();
    let mut seen = HashSet::new();
    proposed
        .iter()
        .all(|f| current.contains(f) && seen.insert(f))
}
