//! Backend collaborators: identity, profiles, organization directory and
//! HR requests, with an in-memory mock and a Supabase client.

pub mod memory;
pub mod retry;
pub mod supabase;
pub mod traits;

pub use memory::MemoryBackend;
pub use supabase::{SupabaseBackend, SupabaseConfig};
pub use traits::{
    AuthEvent, Credentials, IdentityProvider, OrganizationDirectory, ProfileStore, RequestStore,
    Session,
};
