use super::{Error, HttpRequest, Result};

/// Estimate bytes sent for an HTTP request.
///
/// Best-effort HTTP/1.1 framing: request line + headers + CRLF + body. Host and
/// Content-Length are counted the way the client adds them.
pub fn estimate_http_request_bytes(req: &HttpRequest) -> Result<u64> {
    let parsed = url::Url::parse(&req.url).map_err(|_| Error::InvalidUrl(req.url.clone()))?;
    if parsed.scheme() != "http" {
        return Err(Error::OnlyHttpSupported(req.url.clone()));
    }
    Ok(estimate_parsed(&req.method, &parsed, req.body.len() as u64))
}

pub(super) fn estimate_parsed(method: &http::Method, parsed: &url::Url, body_len: u64) -> u64 {
    let mut bytes = request_line_bytes(method, parsed);

    if let Some(host) = host_header_value(parsed) {
        bytes = bytes.saturating_add(header_bytes(b"host", host.as_bytes()));
    }

    if body_len != 0 {
        let v = body_len.to_string();
        bytes = bytes.saturating_add(header_bytes(b"content-length", v.as_bytes()));
    }

    // End of headers.
    bytes.saturating_add(2).saturating_add(body_len)
}

fn request_line_bytes(method: &http::Method, parsed: &url::Url) -> u64 {
    let path_len = parsed.path().len() + parsed.query().map_or(0, |q| q.len() + 1);

    // "METHOD SP path SP HTTP/1.1 CRLF"
    (method.as_str().len() as u64)
        .saturating_add(1)
        .saturating_add(path_len as u64)
        .saturating_add(1)
        .saturating_add("HTTP/1.1".len() as u64)
        .saturating_add(2)
}

pub(super) fn response_head_bytes(status: http::StatusCode, headers: &http::HeaderMap) -> u64 {
    // "HTTP/1.1 SP 200 CRLF" (reason phrase ignored)
    let status_line = ("HTTP/1.1".len() as u64)
        .saturating_add(1)
        .saturating_add(status.as_str().len() as u64)
        .saturating_add(2);

    headers
        .iter()
        .fold(status_line, |acc, (name, value)| {
            acc.saturating_add(header_bytes(name.as_str().as_bytes(), value.as_bytes()))
        })
        .saturating_add(2)
}

fn header_bytes(name: &[u8], value: &[u8]) -> u64 {
    // "name: value\r\n"
    (name.len() as u64)
        .saturating_add(2)
        .saturating_add(value.len() as u64)
        .saturating_add(2)
}

pub(super) fn host_header_value(parsed: &url::Url) -> Option<String> {
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) if port != 80 => Some(format!("{host}:{port}")),
        _ => Some(host.to_string()),
    }
}
