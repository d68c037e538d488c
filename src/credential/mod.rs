mod access;
mod record;
mod store;

pub use access::{AccessCredential, IdentityClaims};
pub use record::{CredentialRecord, FileRecord, MemoryRecord};
pub use store::{CredentialStore, SubscriptionId};
