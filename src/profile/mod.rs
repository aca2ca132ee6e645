//! Collaborator profiles and the organization directory entries they point to.

pub mod model;

pub use model::{Organization, Profile, ProfileDraft, ProfilePatch, Role, Tenure};
