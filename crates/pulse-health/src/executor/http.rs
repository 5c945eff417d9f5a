//! HTTP check executor.
//!
//! Issues a GET to the target URL over a plain TCP connection using
//! hyper's HTTP/1 client. Any status in `[200, 400)` is healthy.

use bytes::Bytes;
use http::Uri;
use http_body_util::Empty;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::debug;

use pulse_core::{CheckDefinition, HealthResult};

use super::{CheckExecutor, CheckFuture};
use crate::error::CheckError;

const USER_AGENT: &str = concat!("pulse-health/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default)]
pub struct HttpExecutor;

impl HttpExecutor {
    pub fn new() -> Self {
        Self
    }

    async fn check(&self, def: &CheckDefinition) -> Result<HealthResult, CheckError> {
        let endpoint = Endpoint::parse(&def.target)?;
        let code = http_get(&endpoint).await?;

        if (200..400).contains(&code) {
            Ok(HealthResult::healthy(&def.name, format!("HTTP {code}"))
                .with_detail("status_code", code)
                .with_detail("url", def.target.as_str()))
        } else {
            debug!(check = %def.name, status = code, url = %def.target, "http check non-success");
            Ok(CheckError::NonSuccessResponse(format!("HTTP {code}"))
                .into_result(&def.name)
                .with_detail("status_code", code)
                .with_detail("url", def.target.as_str()))
        }
    }
}

impl CheckExecutor for HttpExecutor {
    fn run<'a>(&'a self, def: &'a CheckDefinition) -> CheckFuture<'a> {
        Box::pin(self.check(def))
    }
}

/// Connection parameters extracted from an `http://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    host: String,
    port: u16,
    /// Value for the `Host` header.
    authority: String,
    path_and_query: String,
}

impl Endpoint {
    fn parse(target: &str) -> Result<Self, CheckError> {
        let invalid = |reason: &str| CheckError::InvalidTarget {
            target: target.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = target.parse().map_err(|_| invalid("not a valid URL"))?;
        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => return Err(invalid(&format!("unsupported scheme {other}"))),
            None => return Err(invalid("missing scheme")),
        }

        let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
        let host = authority
            .host()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        Ok(Self {
            host,
            port: authority.port_u16().unwrap_or(80),
            authority: authority.as_str().to_string(),
            path_and_query: uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
        })
    }
}

/// Perform the GET and return the response status code.
async fn http_get(endpoint: &Endpoint) -> Result<u16, CheckError> {
    let address = format!("{}:{}", endpoint.host, endpoint.port);

    let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|e| CheckError::ConnectionFailure(format!("{address}: {e}")))?;

    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| CheckError::ConnectionFailure(format!("{address}: handshake failed: {e}")))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method("GET")
        .uri(endpoint.path_and_query.as_str())
        .header("host", endpoint.authority.as_str())
        .header("user-agent", USER_AGENT)
        .body(Empty::<Bytes>::new())
        .map_err(|e| CheckError::InvalidTarget {
            target: address.clone(),
            reason: e.to_string(),
        })?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| CheckError::ConnectionFailure(format!("{address}: request failed: {e}")))?;

    Ok(resp.status().as_u16())
}
