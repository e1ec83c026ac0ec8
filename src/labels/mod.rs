pub mod candidate;
pub mod selector;

pub use candidate::{candidates_from_groups, estimate_label_size, LabelCandidate};
pub use selector::{
    placement_hash, select_labels, BudgetTier, LabelContext, LabelPlacement, LabelPolicy,
    LabelSelector, LabelSlot, LabelUpdate,
};
