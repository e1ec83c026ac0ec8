pub mod builder;
pub mod pool;
pub mod sprites;

pub use builder::{Anchor, MarkerVisual, RenderItem};
pub use pool::{
    assign, surviving_ids, CapKey, MarkerSlotPool, PoolAssignment, PoolConfig, PoolState,
    PoolStats,
};
pub use sprites::{ImageRef, SpriteConfig, SpriteResolver};
