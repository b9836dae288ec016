use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Protocol-specific connection parameters for one [`Service`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum ServiceConfig {
    Http {
        base_url: String,
        #[serde(default)]
        default_headers: HashMap<String, String>,
        #[serde(with = "duration_millis", default = "default_http_timeout")]
        timeout: Duration,
    },
    Grpc {
        host: String,
        port: u16,
        #[serde(default)]
        tls: bool,
        #[serde(with = "duration_millis", default = "default_grpc_timeout")]
        timeout: Duration,
    },
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_grpc_timeout() -> Duration {
    Duration::from_secs(30)
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        #[allow(clippy::cast_possible_truncation)]
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// One network service the engine can address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(flatten)]
    pub config: ServiceConfig,
}

/// The system under test: a named collection of [`Service`]s plus global
/// default headers merged into every HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sut {
    pub name: String,
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
    pub services: HashMap<String, Service>,
}

impl Sut {
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_service_default_timeout() {
        let json = serde_json::json!({
            "protocol": "http",
            "base_url": "http://localhost:8080",
        });
        let config: ServiceConfig = serde_json::from_value(json).unwrap();
        match config {
            ServiceConfig::Http { timeout, .. } => assert_eq!(timeout, Duration::from_secs(30)),
            ServiceConfig::Grpc { .. } => panic!("expected http"),
        }
    }

    #[test]
    fn sut_looks_up_service_by_name() {
        let mut services = HashMap::new();
        services.insert(
            "users".to_string(),
            Service {
                name: "users".to_string(),
                config: ServiceConfig::Http {
                    base_url: "http://users".to_string(),
                    default_headers: HashMap::new(),
                    timeout: Duration::from_secs(5),
                },
            },
        );
        let sut = Sut { name: "demo".to_string(), default_headers: HashMap::new(), services };
        assert!(sut.service("users").is_some());
        assert!(sut.service("missing").is_none());
    }
}
