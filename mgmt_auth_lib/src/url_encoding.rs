use percent_encoding::{percent_decode, percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Encode set for application/x-www-form-urlencoded keeping the RFC 3986 unreserved characters
const FORM_URLENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Encodes a string for URL safety and returns an owned `String`
///
/// # Example
/// ```
/// use mgmt_auth_lib::url_encoding::encode_url_owned;
/// let encoded = encode_url_owned("openid offline_access");
/// assert_eq!(encoded, "openid%20offline_access");
/// ```
pub fn encode_url_owned(input: &str) -> String {
    percent_encode(input.as_bytes(), FORM_URLENCODE_SET).to_string()
}

/// Decodes a URL-encoded string and returns an owned `String`.
///
/// `+` is treated as a space, as in form bodies and query strings.
pub fn decode_url_owned(input: &str) -> String {
    let input = input.replace('+', " ");
    percent_decode(input.as_bytes())
        .decode_utf8_lossy()
        .into_owned()
}

/// Joins key/value pairs into a form body or query string.
///
/// # Example
/// ```
/// use mgmt_auth_lib::url_encoding::encode_form;
/// let body = encode_form(&[("grant_type", "authorization_code"), ("code", "a/b")]);
/// assert_eq!(body, "grant_type=authorization_code&code=a%2Fb");
/// ```
pub fn encode_form(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", encode_url_owned(k), encode_url_owned(v)))
        .collect::<Vec<_>>()
        .join("&")
}
