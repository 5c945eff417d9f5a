//! TCP check executor — healthy if a connection to `host:port` succeeds.

use tokio::net::TcpStream;

use pulse_core::{CheckDefinition, HealthResult};

use super::{CheckExecutor, CheckFuture};
use crate::error::CheckError;

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpExecutor;

impl TcpExecutor {
    async fn check(&self, def: &CheckDefinition) -> Result<HealthResult, CheckError> {
        let (host, port) = parse_host_port(&def.target)?;
        TcpStream::connect((host, port))
            .await
            .map_err(|e| CheckError::ConnectionFailure(format!("{}: {e}", def.target)))?;

        Ok(HealthResult::healthy(&def.name, format!("connected to {}", def.target))
            .with_detail("host", host)
            .with_detail("port", port))
    }
}

impl CheckExecutor for TcpExecutor {
    fn run<'a>(&'a self, def: &'a CheckDefinition) -> CheckFuture<'a> {
        Box::pin(self.check(def))
    }
}

/// Split `host:port`, accepting bracketed IPv6 hosts like `[::1]:80`.
fn parse_host_port(target: &str) -> Result<(&str, u16), CheckError> {
    let invalid = |reason: &str| CheckError::InvalidTarget {
        target: target.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = target
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;

    use super::*;
    use crate::executor::execute;
    use pulse_core::{CheckStatus, CheckType};

    fn tcp_check(target: String) -> CheckDefinition {
        CheckDefinition::new("db", CheckType::Tcp, target).with_timeout(Duration::from_secs(2))
    }

    #[tokio::test]
    async fn listening_port_is_healthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let result = execute(&TcpExecutor, &tcp_check(addr.to_string())).await;
        assert_eq!(result.status, CheckStatus::Healthy);
        assert_eq!(result.details["port"], addr.port());
    }

    #[tokio::test]
    async fn refused_port_is_unhealthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = execute(&TcpExecutor, &tcp_check(addr.to_string())).await;
        assert_eq!(result.status, CheckStatus::Unhealthy);
        assert_eq!(result.details["error_kind"], "connection_failure");
    }

    #[tokio::test]
    async fn malformed_target_is_unknown() {
        let result = execute(&TcpExecutor, &tcp_check("localhost".to_string())).await;
        assert_eq!(result.status, CheckStatus::Unknown);
    }

    #[test]
    fn parses_targets() {
        assert_eq!(parse_host_port("db:5432").unwrap(), ("db", 5432));
        assert_eq!(parse_host_port("[::1]:80").unwrap(), ("::1", 80));
        assert!(parse_host_port(":80").is_err());
        assert!(parse_host_port("db:http").is_err());
        assert!(parse_host_port("db:70000").is_err());
    }
}
