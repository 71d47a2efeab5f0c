//! Consent URL construction.

use crate::config::ProviderConfig;

/// Builds the provider consent URL.
///
/// Offline access with forced consent makes the provider issue a refresh
/// token even when the user granted access before.
pub fn build_auth_url(provider: &ProviderConfig, state: &str, redirect_uri: &str) -> String {
    let scopes = provider.scopes.join(" ");
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&include_granted_scopes=true&state={}",
        provider.auth_url,
        urlencoding::encode(&provider.client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scopes),
        urlencoding::encode(state)
    )
}

/// Callback URL registered with the provider.
pub fn callback_url(callback_base_url: &str) -> String {
    format!(
        "{}/api/drive/oauth/callback",
        callback_base_url.trim_end_matches('/')
    )
}
