//! One-time-code login
//!
//! Code generation, pending-session storage and verification.

pub mod code;
pub mod login;
pub mod sqlite;
pub mod store;
pub mod verify;

pub use code::generate_code;
pub use login::{CodeDelivery, DeliveryError, IssuedCode, LogCodeDelivery, LoginError, LoginService};
pub use sqlite::SqliteSessionStore;
pub use store::{MemorySessionStore, OtcSession, ProfileFields, SessionStore, StoreError};
pub use verify::{AuthenticatedIdentity, VerificationEngine, VerificationError};
