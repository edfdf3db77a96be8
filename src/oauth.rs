//! OAuth install flow helpers.

use std::sync::LazyLock;

use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};

use crate::web_api::{ApiResponse, Params, WebApiClient, WebApiError};

pub const AUTHORIZE_URL: &str = "https://slack.com/oauth/authorize";

static AUTHORIZE_ENDPOINT: LazyLock<Url> =
    LazyLock::new(|| Url::parse(AUTHORIZE_URL).expect("AUTHORIZE_URL is an absolute URL"));

/// App credentials used for the code exchange.
#[derive(Clone, Debug)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

/// Builds the URL a user visits to install the app.
///
/// Scopes are joined with a literal comma; the remaining values are
/// form-encoded.
pub fn authorize_url(client_id: &str, scopes: &[&str], state: &str, redirect_uri: &str) -> String {
    let mut url = AUTHORIZE_ENDPOINT.clone();
    url.set_query(Some(&format!("scope={}", scopes.join(","))));
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("state", state)
        .append_pair("redirect_uri", redirect_uri);
    url.into()
}

impl WebApiClient {
    /// Exchanges an authorization `code` for an access token via
    /// `oauth.access`.
    ///
    /// Like any call, a rejected code comes back as a soft failure.
    pub async fn oauth_access(
        &self,
        credentials: &OAuthCredentials,
        code: &str,
    ) -> Result<ApiResponse, WebApiError> {
        let mut params = Params::new();
        params.insert("client_id".to_string(), credentials.client_id.clone());
        params.insert(
            "client_secret".to_string(),
            credentials.client_secret.expose_secret().clone(),
        );
        params.insert("redirect_uri".to_string(), credentials.redirect_uri.clone());
        params.insert("code".to_string(), code.to_string());
        self.post("oauth.access", &params).await
    }
}
