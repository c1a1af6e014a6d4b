use log::debug;
use oauth2::TokenResponse;
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::{AuthType, AuthUrl, ClientId, ClientSecret, TokenUrl};

use crate::error::{Error, Result};
use crate::source::twitter::endpoint_url;

/// Exchange a consumer key/secret pair for an app-only bearer token
/// (OAuth2 client-credentials grant).
pub fn fetch_app_token(
    api_base: &str,
    consumer_key: &str,
    consumer_secret: &str,
) -> Result<String> {
    let auth_url = AuthUrl::from_url(endpoint_url(api_base, "oauth/authorize")?);
    let token_url = TokenUrl::from_url(endpoint_url(api_base, "oauth2/token")?);

    let oauth_client = BasicClient::new(
        ClientId::new(consumer_key.to_string()),
        Some(ClientSecret::new(consumer_secret.to_string())),
        auth_url,
        Some(token_url),
    )
    .set_auth_type(AuthType::BasicAuth);

    debug!("requesting app-only token from {api_base}");
    let token = oauth_client
        .exchange_client_credentials()
        .request(http_client)
        .map_err(|e| Error::unavailable(format!("app token exchange failed: {e}")))?;

    Ok(token.access_token().secret().to_string())
}
