//! OpenGL seam for the glkit resource wrappers.
//!
//! Everything above this crate talks to GL through [`GlApi`]:
//!
//! - [`DriverGl`] forwards to a real driver through the `gl` crate.
//! - [`HeadlessGl`] emulates the binding-point state machine in software,
//!   so wrapper contracts can be exercised without a window or GPU.
//!
//! [`state`] holds the scoped [`BindingGuard`] used by every wrapper's
//! `bind()`, plus whole-context snapshot and reset helpers.

pub mod api;
pub mod bytes;
pub mod driver;
pub mod headless;
pub mod logging;
pub mod state;
pub mod types;

pub use api::{Context, GlApi};
pub use bytes::{slice_as_bytes, AsBytes};
pub use driver::DriverGl;
pub use headless::HeadlessGl;
pub use state::{BindingGuard, SavedBindings};
pub use types::*;
