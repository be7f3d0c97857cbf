//! Actions hosted by the runtime and the registry that drives their lifecycle.

pub mod handler;
pub mod qrgen;
pub mod registry;

pub use handler::{Action, ActionContext, ActionError};
pub use qrgen::QrGenAction;
pub use registry::{ActionRegistry, ActionState};
