//! Element graph model and input engine for the diagram editor.
//!
//! This crate owns the authoritative diagram state: every shape, text label,
//! connection and group lives in one [`doc::DocStore`], and every mutation
//! goes through its operations so the structural invariants (dense z-order,
//! acyclic parenting, valid connection endpoints, cascading visibility) hold
//! after each call. The host UI layer wires raw input events into
//! [`engine::EngineCore`] and re-renders from [`render::scene`].
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Testable [`engine::EngineCore`]: input events to store mutations |
//! | [`doc`] | Element types and the in-memory document store |
//! | [`hierarchy`] | Grouping, parenting and visibility cascades |
//! | [`geometry`] | Absolute / parent-relative coordinate resolution |
//! | [`input`] | Input event types, connect mode and gesture sessions |
//! | [`hit`] | Hit-testing against diagram elements |
//! | [`render`] | Derived render list and layers-panel tree |
//! | [`error`] | [`error::DocError`], the store's rejection reasons |
//! | [`consts`] | Shared numeric constants (sizes, depth cap, hit slop) |

pub mod consts;
pub mod doc;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod hierarchy;
pub mod hit;
pub mod input;
pub mod render;
