//! CLI command implementations.
//!
//! | Module  | Commands handled  |
//! |---------|-------------------|
//! | `serve` | `Serve`           |
//! | `db`    | `Init`, `Check`   |

pub mod db;
pub mod serve;

pub use db::{cmd_check, cmd_init};
pub use serve::cmd_serve;
