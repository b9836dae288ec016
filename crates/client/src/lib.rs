//! Process-wide pool of per-service HTTP clients and gRPC channels (§4.4).
//!
//! Clients are created lazily on first use and kept for the lifetime of the
//! pool; concurrent requests to the same service share one client. A single
//! mutex guards both maps, following the `DeadLetterQueue` discipline of
//! never holding a `std::sync::Mutex` guard across an `.await` point —
//! client/channel construction happens outside the lock, and only the
//! finished client is inserted under it.

pub mod error;

use std::collections::HashMap;
use std::sync::Mutex;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tonic::transport::{Channel, Endpoint};
use turbulence_core::{ServiceConfig, Sut};

pub use error::ClientPoolError;

struct PoolState {
    http_clients: HashMap<String, reqwest::Client>,
    grpc_channels: HashMap<String, Channel>,
}

/// A process-wide collection of per-service clients, parameterized by the
/// system under test.
pub struct ClientPool {
    sut: Sut,
    state: Mutex<PoolState>,
}

impl ClientPool {
    #[must_use]
    pub fn new(sut: Sut) -> Self {
        Self {
            sut,
            state: Mutex::new(PoolState { http_clients: HashMap::new(), grpc_channels: HashMap::new() }),
        }
    }

    /// Returns the shared HTTP client for `service`, building and caching it
    /// on first use.
    pub async fn http_client(&self, service: &str) -> Result<reqwest::Client, ClientPoolError> {
        if let Some(client) = self.state.lock().expect("client pool mutex poisoned").http_clients.get(service) {
            return Ok(client.clone());
        }

        let service_config = self.sut.service(service).ok_or_else(|| ClientPoolError::UnknownService(service.to_string()))?;
        let ServiceConfig::Http { base_url: _, default_headers, timeout } = &service_config.config else {
            return Err(ClientPoolError::WrongProtocol(service.to_string(), "http"));
        };

        let mut headers = HeaderMap::new();
        for (key, value) in self.sut.default_headers.iter().chain(default_headers.iter()) {
            if let (Ok(name), Ok(value)) = (HeaderName::try_from(key.as_str()), HeaderValue::from_str(value)) {
                headers.insert(name, value);
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(*timeout)
            .build()
            .map_err(|source| ClientPoolError::HttpBuild { service: service.to_string(), source })?;

        self.state
            .lock()
            .expect("client pool mutex poisoned")
            .http_clients
            .insert(service.to_string(), client.clone());
        Ok(client)
    }

    /// Returns the base URL configured for an HTTP service.
    pub fn base_url(&self, service: &str) -> Result<&str, ClientPoolError> {
        let service_config = self.sut.service(service).ok_or_else(|| ClientPoolError::UnknownService(service.to_string()))?;
        match &service_config.config {
            ServiceConfig::Http { base_url, .. } => Ok(base_url.as_str()),
            ServiceConfig::Grpc { .. } => Err(ClientPoolError::WrongProtocol(service.to_string(), "http")),
        }
    }

    /// Returns the shared gRPC channel for `service`, connecting and caching
    /// it on first use.
    pub async fn grpc_channel(&self, service: &str) -> Result<Channel, ClientPoolError> {
        {
            let state = self.state.lock().expect("client pool mutex poisoned");
            if let Some(channel) = state.grpc_channels.get(service) {
                return Ok(channel.clone());
            }
        }

        let service_config = self.sut.service(service).ok_or_else(|| ClientPoolError::UnknownService(service.to_string()))?;
        let ServiceConfig::Grpc { host, port, tls, timeout } = &service_config.config else {
            return Err(ClientPoolError::WrongProtocol(service.to_string(), "grpc"));
        };

        let scheme = if *tls { "https" } else { "http" };
        let uri = format!("{scheme}://{host}:{port}");
        let channel = Endpoint::from_shared(uri)
            .map_err(|source| ClientPoolError::GrpcBuild { service: service.to_string(), source })?
            .timeout(*timeout)
            .connect_lazy();

        self.state
            .lock()
            .expect("client pool mutex poisoned")
            .grpc_channels
            .insert(service.to_string(), channel.clone());
        Ok(channel)
    }

    /// Closes every live client/channel and clears both maps.
    pub fn close_all(&self) {
        let mut state = self.state.lock().expect("client pool mutex poisoned");
        state.http_clients.clear();
        state.grpc_channels.clear();
    }

    #[must_use]
    pub fn http_client_count(&self) -> usize {
        self.state.lock().expect("client pool mutex poisoned").http_clients.len()
    }

    #[must_use]
    pub fn grpc_channel_count(&self) -> usize {
        self.state.lock().expect("client pool mutex poisoned").grpc_channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use std::time::Duration;
    use turbulence_core::Service;

    fn sut_with_http_service(name: &str, base_url: &str) -> Sut {
        let mut services = StdHashMap::new();
        services.insert(
            name.to_string(),
            Service {
                name: name.to_string(),
                config: ServiceConfig::Http {
                    base_url: base_url.to_string(),
                    default_headers: StdHashMap::new(),
                    timeout: Duration::from_secs(5),
                },
            },
        );
        Sut { name: "demo".to_string(), default_headers: StdHashMap::new(), services }
    }

    #[tokio::test]
    async fn reuses_http_client_for_same_service() {
        let pool = ClientPool::new(sut_with_http_service("users", "http://localhost:1"));
        assert_eq!(pool.http_client_count(), 0);
        pool.http_client("users").await.unwrap();
        pool.http_client("users").await.unwrap();
        assert_eq!(pool.http_client_count(), 1);
    }

    #[tokio::test]
    async fn unknown_service_is_an_error() {
        let pool = ClientPool::new(sut_with_http_service("users", "http://localhost:1"));
        assert!(pool.http_client("missing").await.is_err());
    }

    #[tokio::test]
    async fn close_all_clears_clients() {
        let pool = ClientPool::new(sut_with_http_service("users", "http://localhost:1"));
        pool.http_client("users").await.unwrap();
        pool.close_all();
        assert_eq!(pool.http_client_count(), 0);
    }

    #[test]
    fn base_url_reports_configured_value() {
        let pool = ClientPool::new(sut_with_http_service("users", "http://localhost:9999"));
        assert_eq!(pool.base_url("users").unwrap(), "http://localhost:9999");
    }
}
