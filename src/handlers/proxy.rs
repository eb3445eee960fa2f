//! Reverse proxy for everything that is not the WebSocket endpoint
//! Pages, assets and REST calls are served by the game service.

use std::convert::Infallible;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures_util::{pin_mut, Stream, StreamExt};
use log::{trace, warn};
use url::Url;
use warp::http::header::{HeaderMap, HeaderName};
use warp::http::{Method, StatusCode};
use warp::hyper::Body;
use warp::path::FullPath;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

// Connection-level headers are not forwarded in either direction
fn is_forwardable(name: &HeaderName) -> bool {
    !matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "host"
            | "content-length"
    )
}

/// Catch-all filter forwarding the request to `upstream`. Request bodies
/// larger than `max_body` bytes are answered with 413.
pub fn proxy_route(
    http: reqwest::Client,
    upstream: Url,
    max_body: usize,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let raw_query = warp::query::raw()
        .or(warp::any().map(String::new))
        .unify();
    let body = warp::body::stream().then(move |stream| read_capped(stream, max_body));

    warp::method()
        .and(warp::path::full())
        .and(raw_query)
        .and(warp::header::headers_cloned())
        .and(body)
        .and_then(
            move |method: Method,
                  path: FullPath,
                  query: String,
                  headers: HeaderMap,
                  body: Result<Bytes, StatusCode>| {
                forward(http.clone(), upstream.clone(), method, path, query, headers, body)
            },
        )
}

/// Buffer a request body, giving up once it exceeds `limit` bytes
async fn read_capped<S, B>(stream: S, limit: usize) -> Result<Bytes, StatusCode>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    pin_mut!(stream);
    let mut collected = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            warn!("Failed to read request body: {}", e);
            StatusCode::BAD_REQUEST
        })?;
        if collected.len() + chunk.remaining() > limit {
            return Err(StatusCode::PAYLOAD_TOO_LARGE);
        }
        collected.put(chunk);
    }
    Ok(collected.freeze())
}

/// Upstream URL for a request path and raw query string
pub fn target_url(upstream: &Url, path: &str, query: &str) -> Url {
    let mut url = upstream.clone();
    let joined = format!("{}{}", upstream.path().trim_end_matches('/'), path);
    url.set_path(&joined);
    url.set_query(if query.is_empty() { None } else { Some(query) });
    url
}

async fn forward(
    http: reqwest::Client,
    upstream: Url,
    method: Method,
    path: FullPath,
    query: String,
    headers: HeaderMap,
    body: Result<Bytes, StatusCode>,
) -> Result<Response, Infallible> {
    let url = target_url(&upstream, path.as_str(), &query);
    let body = match body {
        Ok(body) => body,
        Err(status) => {
            warn!("Not proxying {} {}: {}", method, url, status);
            return Ok(warp::reply::with_status(status.to_string(), status).into_response());
        }
    };
    trace!("Proxying {} {}", method, url);

    let mut request = http.request(method, url.clone()).body(body);
    for (name, value) in headers.iter().filter(|(name, _)| is_forwardable(name)) {
        request = request.header(name, value);
    }

    let upstream_response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("Proxy request to {} failed: {}", url, e);
            return Ok(bad_gateway());
        }
    };

    let status = upstream_response.status();
    let upstream_headers = upstream_response.headers().clone();

    // Body is streamed through; a failure mid-body aborts the response
    let mut response = Response::new(Body::wrap_stream(upstream_response.bytes_stream()));
    *response.status_mut() = status;
    for (name, value) in upstream_headers.iter().filter(|(name, _)| is_forwardable(name)) {
        response.headers_mut().append(name.clone(), value.clone());
    }
    Ok(response)
}

fn bad_gateway() -> Response {
    warp::reply::with_status("Bad Gateway", StatusCode::BAD_GATEWAY).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::http::header;

    #[test]
    fn test_target_url_keeps_path_and_query() {
        let upstream = Url::parse("http://localhost:5001").unwrap();
        assert_eq!(
            target_url(&upstream, "/lobby", "room_id=R1&user_id=u").as_str(),
            "http://localhost:5001/lobby?room_id=R1&user_id=u"
        );
        assert_eq!(
            target_url(&upstream, "/", "").as_str(),
            "http://localhost:5001/"
        );
    }

    #[test]
    fn test_target_url_with_base_path() {
        let upstream = Url::parse("http://games.local/app/").unwrap();
        assert_eq!(
            target_url(&upstream, "/api/rooms", "").as_str(),
            "http://games.local/app/api/rooms"
        );
    }

    #[tokio::test]
    async fn test_read_capped_stops_at_limit() {
        let chunks = || {
            futures_util::stream::iter(vec![
                Ok::<_, warp::Error>(Bytes::from_static(b"hello ")),
                Ok(Bytes::from_static(b"world")),
            ])
        };
        assert_eq!(
            read_capped(chunks(), 11).await,
            Ok(Bytes::from_static(b"hello world"))
        );
        assert_eq!(
            read_capped(chunks(), 10).await,
            Err(StatusCode::PAYLOAD_TOO_LARGE)
        );
    }

    #[test]
    fn test_hop_by_hop_headers_filtered() {
        assert!(!is_forwardable(&header::CONNECTION));
        assert!(!is_forwardable(&header::HOST));
        assert!(!is_forwardable(&HeaderName::from_static("keep-alive")));
        assert!(is_forwardable(&header::COOKIE));
        assert!(is_forwardable(&header::CONTENT_TYPE));
    }
}
