// ── Domain model ──
//
// Items, their ordered collections and the seven entity kinds they are
// provisioned as.

mod collection;
mod entity_id;
mod item;
mod kind;

pub use collection::{Collection, DataCollections};
pub use entity_id::EntityId;
pub use item::Item;
pub use kind::EntityKind;
