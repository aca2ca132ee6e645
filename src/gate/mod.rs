//! Session gate. Derives the portal mode from backend state and guards
//! route access accordingly.
//!
//! Three states (`Unauthenticated`, `NeedsOnboarding`, `Authenticated`) are
//! recomputed from `{session, profile exists}` on every change rather than
//! tracked as flags, and routes are allowed or redirected by a pure table.

pub mod guard;
pub mod mode;
pub mod session_gate;

pub use guard::{GuardDecision, Route, RouteClass};
pub use mode::{GateSnapshot, Mode};
pub use session_gate::{AuthSubscription, SessionGate};
