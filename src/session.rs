//! Mock login against the `users` collection.
//!
//! There is no password check: the API has no auth endpoint, so a login
//! succeeds when a user with that exact email exists. The user and a fixed
//! token are kept in [`LocalState`] so later commands see the session.

use tracing::info;

use crate::error::{Error, Result};
use crate::fields::Role;
use crate::prefs::{LocalState, TOKEN_KEY, USER_KEY};
use crate::store::EntityStore;
use crate::user::{NewUser, User};

pub const MOCK_TOKEN: &str = "mock-jwt-token";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default)]
pub struct Session {
    user: Option<User>,
    token: Option<String>,
}

impl Session {
    /// Restore whatever a previous command left in `state`.
    pub fn restore(state: &LocalState) -> Self {
        Self { user: state.get(USER_KEY), token: state.get(TOKEN_KEY) }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }

    pub fn login(
        &mut self,
        credentials: &Credentials,
        users: &mut EntityStore<User>,
        state: &mut LocalState,
    ) -> Result<User> {
        let found = users.by_email(&credentials.email)?;
        let user = found
            .into_iter()
            .next()
            .filter(|u| u.email == credentials.email)
            .ok_or_else(|| Error::NotFound("Invalid credentials".into()))?;
        self.establish(user.clone(), state)?;
        info!(user = %user.id, "logged in");
        Ok(user)
    }

    /// Create the account and sign in as it.
    pub fn register(
        &mut self,
        email: &str,
        name: &str,
        password: &str,
        users: &mut EntityStore<User>,
        state: &mut LocalState,
    ) -> Result<User> {
        if email.trim().is_empty() || name.trim().is_empty() {
            return Err(Error::Invalid("email and name are required".into()));
        }
        let draft = NewUser {
            email: email.trim().to_string(),
            name: name.trim().to_string(),
            password: password.to_string(),
            avatar: None,
            role: Role::Member,
        };
        let user = users.create(&draft)?;
        self.establish(user.clone(), state)?;
        Ok(user)
    }

    pub fn logout(&mut self, state: &mut LocalState) -> Result<()> {
        self.user = None;
        self.token = None;
        state.remove(USER_KEY)?;
        state.remove(TOKEN_KEY)
    }

    fn establish(&mut self, user: User, state: &mut LocalState) -> Result<()> {
        state.set(USER_KEY, &user)?;
        state.set(TOKEN_KEY, &MOCK_TOKEN)?;
        self.user = Some(user);
        self.token = Some(MOCK_TOKEN.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::client::Gateway;
    use crate::gateway::local::LocalGateway;
    use serde_json::json;
    use std::sync::Arc;

    fn users() -> EntityStore<User> {
        let gw: Arc<dyn Gateway> = Arc::new(LocalGateway::in_memory(json!({
            "users": [{"id": 1, "email": "ana@example.com", "name": "Ana", "role": "admin"}]
        })));
        EntityStore::new(gw)
    }

    fn creds(email: &str) -> Credentials {
        Credentials { email: email.into(), password: "x".into() }
    }

    #[test]
    fn test_login_stores_user_and_token() {
        let mut users = users();
        let mut state = LocalState::in_memory();
        let mut session = Session::default();

        let user = session.login(&creds("ana@example.com"), &mut users, &mut state).unwrap();

        assert_eq!(user.name, "Ana");
        assert!(session.is_authenticated());
        assert_eq!(state.get::<String>(TOKEN_KEY).as_deref(), Some(MOCK_TOKEN));
        let restored = Session::restore(&state);
        assert_eq!(restored.current_user().map(|u| u.id.as_str()), Some("1"));
    }

    #[test]
    fn test_unknown_email_is_invalid_credentials() {
        let mut users = users();
        let mut state = LocalState::in_memory();
        let mut session = Session::default();

        let err = session.login(&creds("nobody@example.com"), &mut users, &mut state).unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Invalid credentials");
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_register_then_logout() {
        let mut users = users();
        let mut state = LocalState::in_memory();
        let mut session = Session::default();

        let user = session.register("bo@example.com", "Bo", "pw", &mut users, &mut state).unwrap();
        assert_eq!(user.id, "2");
        assert_eq!(session.token(), Some(MOCK_TOKEN));

        session.logout(&mut state).unwrap();
        assert!(session.current_user().is_none());
        assert!(!state.contains(USER_KEY));
        assert!(!state.contains(TOKEN_KEY));
    }
}
