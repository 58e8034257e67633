//! # Relation Graph Model
//!
//! Plain DTOs that cross every boundary: registry ↔ store ↔ index ↔ queries ↔ caller.
//!
//! Design rule: this module is pure data with no I/O, locks or async.

pub mod relation;
pub mod path;
pub mod value;
pub mod property_map;

pub use relation::{DocId, Direction, Relation, RelationDraft, RelationKey};
pub use path::Path;
pub use value::Value;
pub use property_map::{PropertyMap, props};
