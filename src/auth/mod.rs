/// Authentication module
///
/// Token issuing and validation, password hashing, and the workflow that ties
/// them to the credential store.

mod claims;
mod jwt;
mod password;
mod refresh_token;
mod reset_token;
mod workflow;

pub use claims::{Claims, TokenPurpose};
pub use jwt::{generate_access_token, generate_temp_token, validate_token};
pub use password::{hash_password, validate_password_strength, verify_password};
pub use refresh_token::{generate_refresh_token, hash_token};
pub use reset_token::ResetToken;
pub use workflow::{AuthWorkflow, LoginOutcome, Session, WorkflowSettings};
