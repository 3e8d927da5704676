//! Primary login against the ESPN Player site.
//!
//! Tracks a small state machine:
//!
//! ```text
//! LoggedOut ──login()──▶ LoggedIn
//!     │                     │
//!     └──────login()──▶ Failed(code)
//! ```
//!
//! A stored token is preferred over username/password. Successful logins
//! persist the response's `data` object through the [`CredentialStore`].

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::body::ResponseBody;
use crate::config::Endpoints;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{Error, Result};
use crate::session::{Request, Session};

/// Device type the site expects from the Android app.
pub const DEVICE_TYPE: &str = "8";
/// User agent sent with login requests.
pub const LOGIN_USER_AGENT: &str = "Android";

const LOGIN_SUCCESS: &str = "loginsuccess";
const ENDPOINT: &str = "authenticate";

/// Where the auth manager stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    LoggedOut,
    LoggedIn,
    /// Last attempt was rejected with this code.
    Failed(String),
}

/// Performs the primary login and keeps the credential blob current.
pub struct AuthManager {
    session: Arc<Session>,
    store: CredentialStore,
    endpoints: Endpoints,
    state: AuthState,
}

impl AuthManager {
    pub fn new(session: Arc<Session>, store: CredentialStore, endpoints: Endpoints) -> Self {
        Self {
            session,
            store,
            endpoints,
            state: AuthState::LoggedOut,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == AuthState::LoggedIn
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Log in with the stored token, or with `username`/`password` when no
    /// token has been issued yet. Calling this while logged in performs the
    /// exchange again.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingCredentials`] with no token and no username/password
    /// - [`Error::LoginFailure`] when the site answers with any code other
    ///   than `loginsuccess`; stored credentials are left untouched
    /// - [`Error::UnexpectedResponse`] when the answer carries no code
    #[instrument(skip_all)]
    pub fn login(&mut self, username: Option<&str>, password: Option<&str>) -> Result<Credentials> {
        let stored = self.store.load()?;

        let mut request = Request::post(self.endpoints.authenticate())
            .form("format", "json")
            .header("User-Agent", LOGIN_USER_AGENT);

        if let Some(token) = stored.token() {
            debug!("Logging in with stored token");
            request = request.form("token", token);
        } else {
            let (Some(username), Some(password)) = (username, password) else {
                self.state = AuthState::LoggedOut;
                return Err(Error::MissingCredentials);
            };
            let device_id = Uuid::new_v4().to_string();
            debug!(%device_id, "Logging in with username and password");
            request = request
                .form("username", username)
                .form("password", password)
                .form("deviceid", device_id)
                .form("devicetype", DEVICE_TYPE);
        }

        let response = self.session.request(request)?;
        let ResponseBody::Json(body) = &response.body else {
            return Err(Error::unexpected(ENDPOINT, "response is not JSON"));
        };

        let code = body
            .get("code")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::unexpected(ENDPOINT, "no code in response"))?;

        if code != LOGIN_SUCCESS {
            warn!(%code, "Login rejected");
            self.state = AuthState::Failed(code.to_string());
            return Err(Error::LoginFailure(code.to_string()));
        }

        let data = body
            .get("data")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(Map::new);
        let saved = self.store.save(Credentials::new(data))?;

        info!("Logged in");
        self.state = AuthState::LoggedIn;
        Ok(saved)
    }

    /// Forget stored credentials and return to [`AuthState::LoggedOut`].
    pub fn logout(&mut self) -> Result<()> {
        self.store.reset()?;
        self.state = AuthState::LoggedOut;
        info!("Logged out");
        Ok(())
    }
}
