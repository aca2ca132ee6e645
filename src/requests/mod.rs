//! HR request submission and history.

pub mod history;
pub mod model;

pub use history::RequestHistory;
pub use model::{NewRequest, Request, RequestKind, RequestStatus};
