pub mod tenant;

pub use tenant::{resolve_tenant, CurrentTenant};
