use std::collections::HashMap;
use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, Path, Query, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio_util::io::ReaderStream;
use tracing::debug;

use notewire_hub::Subscription;
use notewire_store::{is_valid_path, SaveOutcome};

use crate::error::ServerError;
use crate::page;
use crate::server::AppState;

/// Length of randomly generated note paths.
const RANDOM_PATH_LEN: usize = 5;

fn client_key(info: &Option<ConnectInfo<SocketAddr>>) -> String {
    info.as_ref()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn rate_limited() -> Response {
    (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded.\n").into_response()
}

/// `GET /` redirects to a fresh random note path.
pub async fn root(
    State(state): State<AppState>,
    info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    if !state.limiter.allow(&client_key(&info)) {
        return rate_limited();
    }
    let path: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_PATH_LEN)
        .map(char::from)
        .collect();
    (
        StatusCode::FOUND,
        [(header::LOCATION, format!("/{path}"))],
    )
        .into_response()
}

/// `GET /{path}`: the editor page, or the raw note body for `?raw` and
/// command-line user agents.
pub async fn note_view(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let Some((file, size)) = state.store.open_note(&path)? else {
        // No file is created until the first save.
        return Ok(Html(page::editor(&path, "")).into_response());
    };

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if query.contains_key("raw")
        || user_agent.starts_with("curl")
        || user_agent.starts_with("Wget")
    {
        let stream = ReaderStream::new(tokio::fs::File::from_std(file));
        return Response::builder()
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .header(header::CONTENT_LENGTH, size)
            .body(Body::from_stream(stream))
            .map_err(|e| ServerError::Internal(e.to_string()));
    }

    if size > state.config.max_note_size {
        return Ok((
            StatusCode::PAYLOAD_TOO_LARGE,
            "Note is too large to display.\n",
        )
            .into_response());
    }
    let content = state.store.read(&path)?.unwrap_or_default();
    Ok(Html(page::editor(&path, &content)).into_response())
}

/// `POST /save/{path}`: the write entry point, feeding the save pipeline.
pub async fn save_note(
    State(state): State<AppState>,
    Path(path): Path<String>,
    info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServerError> {
    if !state.limiter.allow(&client_key(&info)) {
        return Ok(rate_limited());
    }

    // Admission filter: refuse early when storage is already over budget.
    // `save` remains the authority and re-checks with the precise delta.
    if !body.is_empty() && state.store.is_overloaded() {
        return Ok((
            StatusCode::SERVICE_UNAVAILABLE,
            "Storage is overloaded.\n",
        )
            .into_response());
    }

    let Some(content) = extract_content(&headers, &body) else {
        return Ok((StatusCode::BAD_REQUEST, "Failed to parse form.\n").into_response());
    };
    if content.len() as u64 > state.config.max_note_size {
        return Ok((
            StatusCode::PAYLOAD_TOO_LARGE,
            format!(
                "Note is too large to save. Maximum size is {}KB.\n",
                state.config.max_note_size / 1024
            ),
        )
            .into_response());
    }

    let outcome = state.pipeline.save(&path, &content).await?;
    let message = match outcome {
        SaveOutcome::Deleted => "Note deleted.\n",
        SaveOutcome::Saved | SaveOutcome::Unchanged => "Note saved.\n",
    };
    Ok((StatusCode::OK, message).into_response())
}

/// Pull the note content out of the request body.
///
/// Browser form posts carry a `content` field. A bare `curl -d "some text"`
/// also arrives form-encoded but without that field; the re-encoded form
/// data (minus the dangling `=`) is then the content. Anything else is
/// treated as the raw body. `None` means the form body is malformed and the
/// request must be rejected, not saved as empty.
fn extract_content(headers: &HeaderMap, body: &Bytes) -> Option<String> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.starts_with("application/x-www-form-urlencoded") {
        return Some(String::from_utf8_lossy(body).into_owned());
    }

    if has_broken_escape(body) {
        return None;
    }
    match serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
        Ok(pairs) => {
            if let Some((_, value)) = pairs.iter().find(|(key, _)| key == "content") {
                return Some(value.clone());
            }
            if pairs.is_empty() {
                return Some(String::new());
            }
            Some(
                serde_urlencoded::to_string(&pairs)
                    .map(|s| s.trim_end_matches('=').to_string())
                    .unwrap_or_default(),
            )
        }
        Err(_) => None,
    }
}

/// True when the body contains a `%` not followed by two hex digits. The
/// urlencoded parser passes such sequences through literally, but they are
/// not a valid form encoding.
fn has_broken_escape(body: &[u8]) -> bool {
    let mut bytes = body.iter();
    while let Some(&b) = bytes.next() {
        if b != b'%' {
            continue;
        }
        let valid = matches!(
            (bytes.next(), bytes.next()),
            (Some(hi), Some(lo)) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit()
        );
        if !valid {
            return true;
        }
    }
    false
}

/// `GET /{path}/{version}`: a read-only view of one prior version.
pub async fn note_version(
    State(state): State<AppState>,
    Path((path, version)): Path<(String, String)>,
) -> Result<Response, ServerError> {
    let Ok(version) = version.parse::<i64>() else {
        return Ok((StatusCode::BAD_REQUEST, "Invalid version.\n").into_response());
    };

    let Some((content, total)) = state.store.version(&path, version)? else {
        return Ok((StatusCode::NOT_FOUND, "Version not found.\n").into_response());
    };

    let prev = if version > 1 { version - 1 } else { 0 };
    let next = if (version as usize) < total - 1 {
        version + 1
    } else {
        0
    };
    Ok(Html(page::history(&path, &content, version, prev, next, total)).into_response())
}

/// `GET /ws/{path}`: upgrade to a live connection that receives every
/// accepted content change for the path until either side disconnects.
pub async fn live_updates(
    State(state): State<AppState>,
    Path(path): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, ServerError> {
    if !is_valid_path(&path) {
        return Ok((StatusCode::BAD_REQUEST, "Invalid path.\n").into_response());
    }
    let subscription = state.hub.subscribe(&path).await?;
    Ok(ws.on_upgrade(move |socket| forward_updates(socket, subscription, path)))
}

async fn forward_updates(mut socket: WebSocket, mut subscription: Subscription, path: String) {
    debug!(%path, "live connection opened");
    loop {
        tokio::select! {
            update = subscription.recv() => {
                // None means the hub evicted us (slow consumer) or shut down.
                let Some(content) = update else { break };
                let text = String::from_utf8_lossy(&content).into_owned();
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    debug!(%path, "live connection closed");
    // Dropping the subscription unregisters it from the hub.
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded".parse().unwrap(),
        );
        headers
    }

    #[test]
    fn raw_body_is_content() {
        let content = extract_content(&HeaderMap::new(), &Bytes::from_static(b"plain text"));
        assert_eq!(content.unwrap(), "plain text");
    }

    #[test]
    fn form_content_field_wins() {
        let body = Bytes::from_static(b"content=hello+world&other=x");
        assert_eq!(extract_content(&form_headers(), &body).unwrap(), "hello world");
    }

    #[test]
    fn bare_curl_form_body_is_content() {
        let body = Bytes::from_static(b"some text");
        assert_eq!(extract_content(&form_headers(), &body).unwrap(), "some+text");
    }

    #[test]
    fn empty_form_is_empty_content() {
        assert_eq!(extract_content(&form_headers(), &Bytes::new()).unwrap(), "");
    }

    #[test]
    fn broken_percent_escape_is_rejected() {
        let body = Bytes::from_static(b"content=%zz");
        assert!(extract_content(&form_headers(), &body).is_none());
        let body = Bytes::from_static(b"100%");
        assert!(extract_content(&form_headers(), &body).is_none());
        // A well-formed escape still parses.
        let body = Bytes::from_static(b"content=100%25");
        assert_eq!(extract_content(&form_headers(), &body).unwrap(), "100%");
    }
}
