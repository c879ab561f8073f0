// ── Session context ──
//
// The authenticated identity for one dashboard session, passed into the
// engine's constructor. Lifecycle is tied to login/logout — there are no
// ambient credential lookups anywhere in the engine.

use secrecy::SecretString;

use crate::model::Role;

/// Who is logged in, with what role, bearing which credential.
#[derive(Debug, Clone)]
pub struct Session {
    username: String,
    role: Role,
    token: SecretString,
}

impl Session {
    pub fn new(username: impl Into<String>, role: Role, token: SecretString) -> Self {
        Self {
            username: username.into(),
            role,
            token,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Authoritative role from the backend's login reply.
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }
}
