//! Transition Controller: moves an audit project between phases.
//!
//! ## Module Map
//!
//! | Module       | Responsibility                                           |
//! |--------------|----------------------------------------------------------|
//! | `request`    | `TransitionKind` and `TransitionRequest`                 |
//! | `controller` | `PhaseController`, guards and the write-then-move commit |
//! | `events`     | `WorkflowEvent` broadcast to UI subscribers              |

pub mod controller;
pub mod events;
pub mod request;

pub use controller::{ControllerSettings, PhaseController, PhaseStatus, WorkflowView};
pub use events::WorkflowEvent;
pub use request::{TransitionKind, TransitionRequest};
