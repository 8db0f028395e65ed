use anyhow::{Result, anyhow};
use hyper::header::{COOKIE, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::debug;

/// Extract cookie value by name. Looks through every `Cookie` header, since
/// HTTP/2 clients may split cookies across several.
pub fn get_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookies| {
            cookies.split(';').find_map(|cookie| {
                let mut parts = cookie.trim().splitn(2, '=');
                let name = parts.next()?.trim();
                let value = parts.next()?.trim();
                if name == cookie_name {
                    debug!("Cookie found: {}", cookie_name);
                    Some(value.trim_matches('"').to_string())
                } else {
                    None
                }
            })
        })
}

/// Build a `Set-Cookie` value with the session cookie's attributes.
pub fn set_cookie(
    name: &str,
    value: &str,
    max_age: Option<Duration>,
    path: Option<&str>,
    http_only: bool,
    secure: bool,
) -> Result<HeaderValue> {
    let mut cookie = format!("{}={}", name, value);

    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", age.as_secs()));
    }

    if let Some(p) = path {
        cookie.push_str(&format!("; Path={}", p));
    }

    if http_only {
        cookie.push_str("; HttpOnly");
    }

    if secure {
        cookie.push_str("; Secure");
    }

    cookie.push_str("; SameSite=Lax");

    HeaderValue::from_str(&cookie).map_err(|e| anyhow!("Invalid cookie value: {}", e))
}

/// Expire a cookie immediately, using the same attributes it was set with.
pub fn delete_cookie(name: &str, secure: bool) -> Result<HeaderValue> {
    debug!("Deleting cookie: {}", name);
    set_cookie(
        name,
        "",
        Some(Duration::from_secs(0)),
        Some("/"),
        true,
        secure,
    )
}
