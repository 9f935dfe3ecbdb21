//! User overlays: marks, stars, renames and custom order
//!
//! Sidecar state keyed by derived UUIDs; parsed conversations stay untouched.

pub mod marks;
pub mod store;

pub use marks::{
    apply_custom_order, clear_custom_order, clear_mark_kind, clear_marks, clear_title_override, custom_order,
    effective_title, is_starred, load_marks, marked_uuids, set_custom_order, set_marks, set_title_override,
    starred_scopes, title_override, toggle_mark, toggle_star, MarkFlags, MarkKind, MarkMap,
};
pub use store::{keys, MemoryOverlayStore, OverlayStore};
