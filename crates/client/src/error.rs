use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientPoolError {
    #[error("unknown service: {0}")]
    UnknownService(String),
    #[error("service {0} is not configured for the {1} protocol")]
    WrongProtocol(String, &'static str),
    #[error("failed to build http client for {service}: {source}")]
    HttpBuild { service: String, #[source] source: reqwest::Error },
    #[error("failed to build grpc channel for {service}: {source}")]
    GrpcBuild { service: String, #[source] source: tonic::transport::Error },
}
