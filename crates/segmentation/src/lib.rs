//! Segment builder core: field catalog, typed condition values, the
//! OR-of-AND group store, drag-and-drop placement, and the simulated
//! audience estimation.

pub mod builder;
pub mod catalog;
pub mod conditions;
pub mod estimation;
pub mod placement;
pub mod preview;
pub mod store;

pub use builder::{GroupPayload, SegmentBuilder};
pub use catalog::{FieldCatalog, FieldCategory, FieldDefinition, ValueType};
pub use conditions::{ConditionEdit, ConditionValue};
pub use estimation::{EstimationMachine, EstimationPhase, ManualScheduler, StepScheduler, TokioScheduler};
pub use placement::{DropZoneRegistry, PlacementEngine, RectZoneRegistry, ZoneId};
pub use store::{ConditionGroup, GroupId, GroupStore};
