//! Kanban board back-end: boards, ordered columns and ordered tasks.
//!
//! ## Overview
//!
//! Columns of a board and tasks of a column each keep a dense position
//! sequence `0..n`. Every create, delete and move computes the sibling shift
//! with `taskboard_common::position`, applies it inside one SQLite write
//! transaction, checks the sequence is still dense, and only then commits.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig, layers)  │
//! │          │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘   JSON   │         │  principal.rs (x-user-id extractor)    │
//!                       │         │  validate.rs  (field rules)            │
//!                       │         │                                        │
//!                       │         │ DbHandle::call() on spawn_blocking     │
//!                       │         v                                        │
//!                       │  boards.rs / columns.rs / tasks.rs               │
//!                       │         │  plan shift → apply → ensure_dense     │
//!                       │         v                                        │
//!                       │  db.rs  (BoardDb, Scope, IMMEDIATE transactions) │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Typical Request Flow (move a task to another column)
//!
//! 1. `PUT /api/tasks/{id}` → `api::update_task()`; `position` is type-checked.
//! 2. `BoardDb::update_task()` opens an IMMEDIATE transaction and looks the
//!    task and both columns up, scoped to the caller.
//! 3. `position::plan_cross_move()` yields the origin and destination shifts.
//! 4. Both shifts and the task row are written, both columns are checked for
//!    density, and the transaction commits (or rolls back on any failure).

pub mod api;
pub mod boards;
pub mod columns;
pub mod db;
pub mod principal;
pub mod server;
pub mod tasks;
pub mod validate;
