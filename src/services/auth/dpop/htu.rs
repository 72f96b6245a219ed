//! Effective request URL used for `htu` binding: scheme + host + path.
//! Query and fragment never take part.
use axum::http::{HeaderMap, Uri, header};

/// RFC 9449 expects an absolute URI. In practice you often sit behind a proxy,
/// so a configured public base URL wins over forwarded headers.
pub fn effective_url(headers: &HeaderMap, uri: &Uri, public_base_url: Option<&str>) -> String {
    if let Some(base) = public_base_url {
        if let Ok(url) = from_base(base, uri) {
            return url;
        }
        tracing::warn!(base, "invalid public base url, falling back to forwarded headers");
    }
    from_forwarded(headers, uri)
}

fn from_base(base: &str, uri: &Uri) -> Result<String, url::ParseError> {
    // `base` is an origin, optionally with the path prefix a proxy mounts us under.
    let mut url = url::Url::parse(base)?;

    let path = format!("{}{}", url.path().trim_end_matches('/'), uri.path());
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url.to_string())
}

fn first_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn from_forwarded(headers: &HeaderMap, uri: &Uri) -> String {
    // Prefer proxy headers when present.
    let scheme = first_value(headers, "x-forwarded-proto")
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");

    let host = first_value(headers, "x-forwarded-host")
        .or_else(|| first_value(headers, header::HOST.as_str()))
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");

    format!("{}://{}{}", scheme, host, uri.path())
}
