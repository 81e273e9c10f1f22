//! # ssc-renderer
//!
//! Tera-based DDL generator for ssc artifacts: object definitions with
//! idempotency guards, permission grants, schemas, tables, user types, table
//! data, agent jobs, and bundle audit headers.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ssc_core::{Setting, SqlObject};
//! use ssc_renderer::Renderer;
//!
//! fn render_one(object: &SqlObject, setting: &Setting) {
//!     if let Ok(renderer) = Renderer::new() {
//!         if let Ok(sql) = renderer.render_artifact(object, &[], setting) {
//!             println!("{} bytes", sql.len());
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use engine::Renderer;
pub use error::RenderError;
