// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Firebase email-link sign-in by way of the Identity Toolkit REST API
//!
//! see: <https://firebase.google.com/docs/reference/rest/auth>

use std::fmt;

#[allow(unused_imports)]
use log::{debug, error, info, trace};

use ::reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use super::{AuthCallback, AuthNotifier, IdentityProvider, Subscription};
use crate::error::Error;
use crate::types::Identity;

/// Identity Toolkit endpoint used when none is configured
pub const DEFAULT_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";
/// Page the sign-in link sends the user back to when none is configured
pub const DEFAULT_CONTINUE_URL: &str = "http://localhost:3000/callback";

/// Errors that can happen while talking to the Identity Toolkit API
#[derive(Debug)]
pub enum FirebaseError {
    /// Error during reqwest HTTP request
    Reqwest(::reqwest::Error),
    /// Error reported by the API
    Api {
        /// HTTP status
        code: u16,
        /// Error code, such as `INVALID_OOB_CODE`
        message: String,
    },
    /// The configured endpoint can't be parsed
    InvalidUrl(String),
}

impl fmt::Display for FirebaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirebaseError::Reqwest(err) => write!(f, "HTTP request failed: {}", err),
            FirebaseError::Api { code, message } => write!(f, "{} ({})", message, code),
            FirebaseError::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
        }
    }
}

impl std::error::Error for FirebaseError {}

impl_error!(::reqwest::Error, Reqwest, FirebaseError);

/// Configuration for [`FirebaseAuth`]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FirebaseConfig {
    /// Web API key of the Firebase project
    #[serde(default)]
    pub api_key: String,
    /// URL the sign-in link points back to
    #[serde(default = "default_continue_url")]
    pub continue_url: String,
    /// Base URL of the Identity Toolkit API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_continue_url() -> String {
    DEFAULT_CONTINUE_URL.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        FirebaseConfig {
            api_key: String::new(),
            continue_url: default_continue_url(),
            endpoint: default_endpoint(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendOobCodeRequest<'a> {
    request_type: &'static str,
    email: &'a str,
    continue_url: &'a str,
    can_handle_code_in_app: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithEmailLinkRequest<'a> {
    email: &'a str,
    oob_code: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithEmailLinkResponse {
    id_token: String,
    local_id: String,
    email: Option<String>,
    refresh_token: Option<String>,
}

impl From<SignInWithEmailLinkResponse> for Identity {
    fn from(resp: SignInWithEmailLinkResponse) -> Self {
        Identity {
            uid: resp.local_id,
            email: resp.email,
            id_token: resp.id_token,
            refresh_token: resp.refresh_token,
        }
    }
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    code: u16,
    message: String,
}

/// Return the one-time code carried by a sign-in link
///
/// `None` unless the link parses and its query has `mode=signIn` and an `oobCode`.
pub fn sign_in_code(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;

    let mut is_sign_in = false;
    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "mode" => is_sign_in = value == "signIn",
            "oobCode" if !value.is_empty() => code = Some(value.into_owned()),
            _ => {}
        }
    }

    code.filter(|_| is_sign_in)
}

/// [`IdentityProvider`] backed by a Firebase project
#[derive(Debug)]
pub struct FirebaseAuth {
    config: FirebaseConfig,
    client: Client,
    notifier: AuthNotifier,
}

impl FirebaseAuth {
    /// Create a new provider from a [`FirebaseConfig`]
    pub fn new(config: FirebaseConfig) -> Self {
        FirebaseAuth {
            config,
            client: Client::new(),
            notifier: AuthNotifier::new(),
        }
    }

    /// Return the configuration
    pub fn config(&self) -> &FirebaseConfig {
        &self.config
    }

    pub(crate) fn method_url(&self, method: &str) -> Result<Url, FirebaseError> {
        let base = self.config.endpoint.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/accounts:{}", base, method))
            .map_err(|_| FirebaseError::InvalidUrl(self.config.endpoint.clone()))?;
        url.query_pairs_mut().append_pair("key", &self.config.api_key);

        Ok(url)
    }

    async fn post<B: Serialize>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<::reqwest::Response, FirebaseError> {
        let url = self.method_url(method)?;
        trace!("POST accounts:{}", method);

        let resp = self.client.post(url).json(body).send().await?;
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status().as_u16();
        let message = match resp.json::<ApiErrorResponse>().await {
            Ok(body) => {
                return Err(FirebaseError::Api {
                    code: body.error.code,
                    message: body.error.message,
                })
            }
            Err(_) => format!("HTTP_{}", status),
        };

        Err(FirebaseError::Api {
            code: status,
            message,
        })
    }
}

#[async_trait(?Send)]
impl IdentityProvider for FirebaseAuth {
    fn subscribe(&self, callback: AuthCallback) -> Subscription {
        self.notifier.subscribe(callback)
    }

    async fn send_sign_in_link(&self, email: &str, return_url: &str) -> Result<(), Error> {
        let body = SendOobCodeRequest {
            request_type: "EMAIL_SIGNIN",
            email,
            continue_url: return_url,
            can_handle_code_in_app: true,
        };
        self.post("sendOobCode", &body).await?;

        Ok(())
    }

    async fn complete_sign_in_with_link(
        &self,
        email: &str,
        link: &str,
    ) -> Result<Identity, Error> {
        let oob_code = sign_in_code(link)
            .ok_or_else(|| Error::AuthLinkInvalid("missing oobCode".to_string()))?;
        let body = SignInWithEmailLinkRequest {
            email,
            oob_code: &oob_code,
        };

        let resp = match self.post("signInWithEmailLink", &body).await {
            Ok(resp) => resp,
            Err(FirebaseError::Api { message, .. })
                if message.starts_with("INVALID_OOB_CODE")
                    || message.starts_with("EXPIRED_OOB_CODE")
                    || message.starts_with("EMAIL_NOT_FOUND")
                    || message.starts_with("INVALID_EMAIL") =>
            {
                return Err(Error::AuthLinkInvalid(message));
            }
            Err(e) => return Err(e.into()),
        };

        let identity: Identity = resp
            .json::<SignInWithEmailLinkResponse>()
            .await
            .map_err(FirebaseError::from)?
            .into();
        self.notifier.set(Some(identity.clone()));

        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), Error> {
        self.notifier.set(None);
        Ok(())
    }

    fn is_sign_in_link(&self, link: &str) -> bool {
        sign_in_code(link).is_some()
    }

    fn restore(&self, identity: Identity) {
        debug!("Restoring session of {}", identity.uid);
        self.notifier.set(Some(identity));
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn auth() -> FirebaseAuth {
        FirebaseAuth::new(FirebaseConfig {
            api_key: "AIzaTest".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_sign_in_code() {
        assert_eq!(
            sign_in_code(
                "http://localhost:3000/callback?apiKey=AIzaTest&oobCode=abc123&mode=signIn&lang=en"
            )
            .as_deref(),
            Some("abc123")
        );
        assert_eq!(
            sign_in_code("http://localhost:3000/callback?mode=resetPassword&oobCode=abc123"),
            None
        );
        assert_eq!(
            sign_in_code("http://localhost:3000/callback?mode=signIn"),
            None
        );
        assert_eq!(sign_in_code("not a link"), None);
    }

    #[test]
    fn test_is_sign_in_link() {
        let auth = auth();
        assert!(auth.is_sign_in_link("https://app.example/callback?mode=signIn&oobCode=x"));
        assert!(!auth.is_sign_in_link("https://app.example/dashboard"));
    }

    #[test]
    fn test_method_url() {
        let url = auth().method_url("sendOobCode").unwrap();
        assert_eq!(
            url.as_str(),
            "https://identitytoolkit.googleapis.com/v1/accounts:sendOobCode?key=AIzaTest"
        );
    }

    #[test]
    fn test_request_bodies() {
        let body = SendOobCodeRequest {
            request_type: "EMAIL_SIGNIN",
            email: "alice@example.com",
            continue_url: DEFAULT_CONTINUE_URL,
            can_handle_code_in_app: true,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "requestType": "EMAIL_SIGNIN",
                "email": "alice@example.com",
                "continueUrl": "http://localhost:3000/callback",
                "canHandleCodeInApp": true,
            })
        );

        let body = SignInWithEmailLinkRequest {
            email: "alice@example.com",
            oob_code: "abc",
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"email":"alice@example.com","oobCode":"abc"}"#
        );
    }

    #[test]
    fn test_identity_from_response() {
        let resp: SignInWithEmailLinkResponse = serde_json::from_str(
            r#"{
                "kind": "identitytoolkit#EmailLinkSigninResponse",
                "idToken": "tok",
                "email": "alice@example.com",
                "refreshToken": "ref",
                "expiresIn": "3600",
                "localId": "uid1",
                "isNewUser": false
            }"#,
        )
        .unwrap();
        let identity = Identity::from(resp);
        assert_eq!(identity.uid, "uid1");
        assert_eq!(identity.refresh_token.as_deref(), Some("ref"));
    }

    #[test]
    fn test_invalid_email_maps_to_field_error() {
        let err: Error = FirebaseError::Api {
            code: 400,
            message: "INVALID_EMAIL".to_string(),
        }
        .into();
        assert!(matches!(err, Error::InvalidEmailFormat));

        let err: Error = FirebaseError::Api {
            code: 400,
            message: "QUOTA_EXCEEDED".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Firebase(_)));
    }

    #[tokio::test]
    async fn test_link_without_code_is_rejected_locally() {
        let err = auth()
            .complete_sign_in_with_link("alice@example.com", "http://localhost:3000/callback")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthLinkInvalid(_)));
    }

    #[tokio::test]
    async fn test_sign_out_notifies() {
        let auth = auth();
        auth.notifier.set(Some(Identity {
            uid: "uid1".into(),
            email: None,
            id_token: "tok".into(),
            refresh_token: None,
        }));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        let _sub = auth.subscribe(Box::new(move |i| {
            seen_cb.lock().unwrap().push(i.is_some());
        }));

        auth.sign_out().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_restore_notifies() {
        let auth = auth();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        let _sub = auth.subscribe(Box::new(move |i| {
            seen_cb.lock().unwrap().push(i.map(|i| i.uid.clone()));
        }));

        auth.restore(Identity {
            uid: "uid1".into(),
            email: Some("alice@example.com".into()),
            id_token: "tok".into(),
            refresh_token: Some("refresh".into()),
        });
        assert_eq!(*seen.lock().unwrap(), vec![None, Some("uid1".to_string())]);
        assert_eq!(
            auth.notifier.current().and_then(|i| i.refresh_token).as_deref(),
            Some("refresh")
        );
    }
}
