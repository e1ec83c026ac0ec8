pub mod filter;
pub mod grouping;
pub mod marker;

pub use filter::{FilterState, FilterStore, SubscriptionId};
pub use grouping::{group_by_location, LocationGroup};
pub use marker::{sanitize, Category, MarkerPoint};
