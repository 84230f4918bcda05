use std::collections::HashMap;

use super::identity_error::IdentityError;

/// Tokens carried by the fragment of a magic link redirect URL.
#[derive(Clone, Debug, PartialEq)]
pub struct RedirectTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub expires_at: Option<i64>,
}

fn parse_fragment(fragment: &str) -> HashMap<String, String> {
    fragment
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            // form encoding, '+' stands for a space
            let v = v.replace('+', " ");
            let v = urlencoding::decode(&v).ok()?.into_owned();
            Some((k.to_string(), v))
        })
        .collect()
}

/// Extracts the session tokens from a redirect URL such as
/// `http://localhost:3000/#access_token=...&refresh_token=...&type=magiclink`.
pub fn parse_redirect_url(redirect_url: &str) -> Result<RedirectTokens, IdentityError> {
    let url = reqwest::Url::parse(redirect_url)
        .map_err(|e| IdentityError::Redirect(format!("{redirect_url}: {e}")))?;

    let fragment = match url.fragment() {
        Some(f) if !f.is_empty() => f,
        _ => {
            return Err(IdentityError::Redirect(
                "redirect url has no fragment".to_string(),
            ))
        }
    };

    let mut params = parse_fragment(fragment);

    if let Some(description) = params
        .remove("error_description")
        .or_else(|| params.remove("error"))
    {
        return Err(IdentityError::Provider(description));
    }

    let access_token = match params.remove("access_token") {
        Some(t) if !t.is_empty() => t,
        _ => {
            return Err(IdentityError::Redirect(
                "redirect url carries no access_token".to_string(),
            ))
        }
    };

    Ok(RedirectTokens {
        access_token,
        refresh_token: params.remove("refresh_token"),
        token_type: params.remove("token_type"),
        expires_in: params.get("expires_in").and_then(|v| v.parse().ok()),
        expires_at: params.get("expires_at").and_then(|v| v.parse().ok()),
    })
}
