use url::Url;

use crate::oauth_core::crypto::CsrfState;
use crate::oauth_core::error::AuthError;

/// Check a captured redirect and pull the authorization code out of it.
///
/// The target must point at `expected` (scheme, host, port and path), carry
/// the state we sent, and then either a `code` or an `error`.
pub fn authorization_code(
    location: &str,
    expected: &Url,
    state: &CsrfState,
) -> Result<String, AuthError> {
    let target = Url::parse(location).map_err(|e| {
        AuthError::MalformedLocation(format!("cannot parse Location header: {e}"))
    })?;

    if target.scheme() != expected.scheme()
        || target.host_str() != expected.host_str()
        || target.port_or_known_default() != expected.port_or_known_default()
        || target.path() != expected.path()
    {
        let mut actual = target.clone();
        actual.set_query(None);
        return Err(AuthError::RedirectMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }

    let param = |name: &str| {
        target
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    match param("state") {
        Some(echoed) if state.matches(&echoed) => {}
        _ => return Err(AuthError::CsrfMismatch),
    }

    if let Some(code) = param("code").filter(|c| !c.is_empty()) {
        return Ok(code);
    }
    match param("error") {
        Some(error) => Err(AuthError::IdentityRejection {
            error,
            description: param("error_description").unwrap_or_default(),
        }),
        None => Err(AuthError::MalformedLocation(
            "redirect carries neither an authorization code nor an error".into(),
        )),
    }
}
