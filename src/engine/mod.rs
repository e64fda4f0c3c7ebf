//! Editing engine.
//!
//! Every operation is a synchronous transition on [`EditorState`](crate::models::EditorState),
//! implemented as inherent methods split by concern:
//!
//! - [`pages`]: flatten, reorder, block move, drop dispatch, rotate, delete, undo/redo
//! - [`selection`]: toggle, explicit set, select/deselect all, range extension, click
//! - [`files`]: add, remove and reorder uploads, step navigation, full reset
//! - [`tasks`]: assembly request construction and the worker response dispatch
//!
//! Operations never fail. Input that does not resolve (unknown ids, empty
//! selections) makes the operation a no-op, reported through a `false` or
//! `None` return value.

pub mod files;
pub mod pages;
pub mod reorder;
pub mod selection;
pub mod tasks;

pub use reorder::{array_move, block_move};
