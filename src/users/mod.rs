pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use memory::InMemoryCredentialStore;
pub use model::{NewUser, RefreshTokenRecord, ResetState, Role, User, UserProfile};
pub use postgres::PgCredentialStore;
pub use store::{AccountChange, CredentialStore, PasswordChange};
