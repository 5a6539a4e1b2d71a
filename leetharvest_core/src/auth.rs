use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::queries::{OP_USER_STATUS, QUERY_USER_STATUS};
use crate::transport::{
    BASE_URL, DEFAULT_USER_AGENT, GRAPHQL_URL, GraphqlTransport, HttpGraphqlTransport,
};
use crate::{Error, Result};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(15);
const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);
const VALIDATE_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(2);
const BACKOFF_MAX: Duration = Duration::from_secs(10);

/// Session cookies lifted from a signed-in browser.
#[derive(Clone)]
pub struct Credentials {
    session: String,
    csrf_token: String,
    cf_clearance: String,
}

impl Credentials {
    pub fn new(
        session: impl Into<String>,
        csrf_token: impl Into<String>,
        cf_clearance: impl Into<String>,
    ) -> Result<Self> {
        let session = session.into();
        let csrf_token = csrf_token.into();
        let cf_clearance = cf_clearance.into();
        for (name, value) in [
            ("LEETCODE_SESSION", &session),
            ("csrftoken", &csrf_token),
            ("cf_clearance", &cf_clearance),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidInput(format!("missing credential: {name}")));
            }
        }
        Ok(Self {
            session,
            csrf_token,
            cf_clearance,
        })
    }
}

// Credentials never print their values.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("session", &"<redacted>")
            .field("csrf_token", &"<redacted>")
            .field("cf_clearance", &"<redacted>")
            .finish()
    }
}

/// Builds the cookie-configured transport and checks the session is live.
#[derive(Debug, Clone)]
pub struct Authenticator {
    credentials: Credentials,
}

impl Authenticator {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Validates the credentials against the user-status query and returns
    /// the signed-in username.
    ///
    /// Network failures are retried with doubling backoff; a response that
    /// says `isSignedIn: false` fails immediately, the cookies are stale.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn validate(&self) -> Result<String> {
        let transport = self.http_transport(VALIDATE_TIMEOUT)?;
        self.validate_over(&transport, BACKOFF_BASE).await
    }

    /// Transport the harvest runs over, with the session baked into every
    /// request.
    pub fn transport(&self) -> Result<HttpGraphqlTransport> {
        self.http_transport(CLIENT_TIMEOUT)
    }

    async fn validate_over(
        &self,
        transport: &dyn GraphqlTransport,
        base_delay: Duration,
    ) -> Result<String> {
        let mut delay = base_delay;
        let mut attempt = 1;
        loop {
            match user_status(transport).await {
                Ok(username) => {
                    info!(username = %username, "authentication successful");
                    return Ok(username);
                }
                Err(e) if retryable(&e) && attempt < VALIDATE_ATTEMPTS => {
                    warn!(attempt, error = %e, "network error during credential check; retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(BACKOFF_MAX);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn http_transport(&self, timeout: Duration) -> Result<HttpGraphqlTransport> {
        let client = reqwest::Client::builder()
            .default_headers(self.headers()?)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::transport("build http client", e))?;
        Ok(HttpGraphqlTransport::new(client, GRAPHQL_URL))
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(BASE_URL));
        headers.insert(ORIGIN, HeaderValue::from_static(BASE_URL));
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers.insert(
            HeaderName::from_static("x-csrftoken"),
            HeaderValue::from_str(&self.credentials.csrf_token)
                .map_err(|e| Error::InvalidInput(format!("csrf token is not header-safe: {e}")))?,
        );
        let cookie = format!(
            "LEETCODE_SESSION={}; csrftoken={}; cf_clearance={}",
            self.credentials.session, self.credentials.csrf_token, self.credentials.cf_clearance
        );
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&cookie)
                .map_err(|e| Error::InvalidInput(format!("cookies are not header-safe: {e}")))?,
        );
        Ok(headers)
    }
}

async fn user_status(transport: &dyn GraphqlTransport) -> Result<String> {
    let body = transport
        .execute(QUERY_USER_STATUS, json!({}), OP_USER_STATUS)
        .await?;

    if let Some(errors) = body.get("errors") {
        return Err(Error::Auth(format!("credential check failed: {errors}")));
    }

    let status = body
        .pointer("/data/userStatus")
        .filter(|s| !s.is_null())
        .ok_or_else(|| Error::Auth("user status missing from response".to_string()))?;

    let signed_in = status
        .get("isSignedIn")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !signed_in {
        return Err(Error::Auth(
            "session rejected (isSignedIn=false); cookies may be stale".to_string(),
        ));
    }

    match status.get("username").and_then(Value::as_str) {
        Some(username) if !username.is_empty() => Ok(username.to_string()),
        _ => Err(Error::Auth(
            "signed in but no username in response".to_string(),
        )),
    }
}

/// Only connection-level failures are worth retrying; a rejected status or
/// a malformed body will not improve on a second attempt.
fn retryable(e: &Error) -> bool {
    match e {
        Error::Transport { source, .. } => source
            .downcast_ref::<reqwest::Error>()
            .map_or(true, |re| !re.is_status()),
        _ => false,
    }
}
