//! Shared domain types for the Taskboard service.
//!
//! - [`models`]: boards, columns, tasks and subtasks as they are persisted
//!   and served.
//! - [`position`]: the pure arithmetic that keeps sibling positions dense.

pub mod models;
pub mod position;

pub use models::*;
pub use position::Shift;
