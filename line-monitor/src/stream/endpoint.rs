//! Channel endpoint derivation.

use reqwest::Url;

use super::error::StreamError;

/// Derive the websocket URL from the backend origin.
///
/// The channel lives on the same host and port as the origin; a secure
/// origin gives a secure channel. `path` replaces the origin's path.
///
/// # Examples
///
/// ```
/// use line_monitor::stream::channel_url;
///
/// let url = channel_url("https://line.example:8443", "/ws").unwrap();
/// assert_eq!(url.as_str(), "wss://line.example:8443/ws");
///
/// let url = channel_url("http://10.0.0.5:8080/", "/ws").unwrap();
/// assert_eq!(url.as_str(), "ws://10.0.0.5:8080/ws");
/// ```
pub fn channel_url(origin: &str, path: &str) -> Result<Url, StreamError> {
    let origin = Url::parse(origin).map_err(|e| StreamError::Endpoint(format!("{origin}: {e}")))?;

    let scheme = match origin.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(StreamError::Endpoint(format!("unsupported scheme {other}"))),
    };

    if origin.host_str().is_none() {
        return Err(StreamError::Endpoint(format!("{origin} has no host")));
    }

    let mut url = origin
        .join(path)
        .map_err(|e| StreamError::Endpoint(format!("{path}: {e}")))?;
    url.set_scheme(scheme)
        .map_err(|()| StreamError::Endpoint(format!("cannot use scheme {scheme}")))?;

    Ok(url)
}
