use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use prost::Message as _;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, MethodDescriptor};
use serde_json_path::JsonPath;
use tonic::client::Grpc;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{MetadataKey, MetadataValue};
use tonic::{Request, Status};
use tonic_reflection::pb::v1::server_reflection_client::ServerReflectionClient;
use tonic_reflection::pb::v1::server_reflection_request::MessageRequest;
use tonic_reflection::pb::v1::server_reflection_response::MessageResponse;
use tonic_reflection::pb::v1::ServerReflectionRequest;
use turbulence_client::ClientPool;
use turbulence_core::{Action, GrpcAction, Observation, WorkflowContext};

use crate::error::RunnerError;
use crate::runner_trait::ActionRunner;

/// A `prost::Message`-compatible codec that carries no static message type —
/// encoding/decoding is driven entirely by the [`MethodDescriptor`] resolved
/// through server reflection (§4.11).
#[derive(Clone)]
struct DynamicCodec {
    output: MessageDescriptor,
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;
    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder { output: self.output.clone() }
    }
}

struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, buf: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode(buf).map_err(|e| Status::internal(e.to_string()))
    }
}

struct DynamicDecoder {
    output: MessageDescriptor,
}

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, buf: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let message = DynamicMessage::decode(self.output.clone(), buf).map_err(|e| Status::internal(e.to_string()))?;
        Ok(Some(message))
    }
}

/// Executes [`GrpcAction`]s against a service resolved through server
/// reflection (§4.11): no `.proto` files are compiled into the binary, the
/// method's request/response shapes are discovered at call time.
pub struct GrpcRunner {
    pool: Arc<ClientPool>,
}

impl GrpcRunner {
    #[must_use]
    pub fn new(pool: Arc<ClientPool>) -> Self {
        Self { pool }
    }

    async fn run_grpc(&self, name: &str, action: &GrpcAction, mut context: WorkflowContext) -> Result<(Observation, WorkflowContext), RunnerError> {
        let channel = self.pool.grpc_channel(&action.service).await?;

        let (service_name, method_name) = match action.method.split_once('/') {
            Some(parts) => parts,
            None => return Ok((failed_observation(name, &action.service, format!("malformed method {:?}, expected Package.Service/Method", action.method)), context)),
        };

        let method = match resolve_method(channel.clone(), service_name, method_name).await {
            Ok(method) => method,
            Err(message) => return Ok((failed_observation(name, &action.service, message), context)),
        };

        let ctx_value = context.as_value();
        let rendered_body = match turbulence_template::render_value(&action.body, &ctx_value) {
            Ok(value) => value,
            Err(err) => return Ok((failed_observation(name, &action.service, err.to_string()), context)),
        };

        let request_message = match build_dynamic_message(method.input(), &rendered_body) {
            Ok(message) => message,
            Err(message) => return Ok((failed_observation(name, &action.service, message), context)),
        };

        let mut request = Request::new(request_message);
        for (key, value) in &action.metadata {
            let (Ok(metadata_key), Ok(metadata_value)) = (MetadataKey::from_bytes(key.as_bytes()), MetadataValue::try_from(value.as_str())) else {
                continue;
            };
            request.metadata_mut().insert(metadata_key, metadata_value);
        }

        let path = match PathAndQuery::try_from(format!("/{}/{}", service_name, method_name)) {
            Ok(path) => path,
            Err(err) => return Ok((failed_observation(name, &action.service, err.to_string()), context)),
        };

        let codec = DynamicCodec { output: method.output() };
        let mut grpc = Grpc::new(channel);
        let start = Instant::now();

        if let Err(status) = grpc.ready().await {
            return Ok((failed_observation(name, &action.service, status.to_string()), context));
        }

        let result = grpc.unary(request, path, codec).await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let response_message = match result {
            Ok(response) => response.into_inner(),
            Err(status) => {
                let observation = Observation {
                    ok: false,
                    protocol: "grpc".to_string(),
                    action_name: name.to_string(),
                    service: Some(action.service.clone()),
                    status_code: Some(u16::try_from(status.code() as i32).unwrap_or(u16::MAX)),
                    latency_ms,
                    headers: HashMap::new(),
                    body: serde_json::Value::Null,
                    errors: vec![status.message().to_string()],
                    metadata: HashMap::new(),
                    attempts: Vec::new(),
                    branch_condition: None,
                    branch_result: None,
                    branch_taken: None,
                    condition_skipped: false,
                };
                return Ok((observation, context));
            }
        };

        let body = match dynamic_message_to_json(&response_message) {
            Ok(value) => value,
            Err(message) => return Ok((failed_observation(name, &action.service, message), context)),
        };

        for (key, jsonpath_expr) in &action.extract {
            match extract_jsonpath(&body, jsonpath_expr) {
                Ok(value) => context.set(key.clone(), value),
                Err(message) => return Ok((failed_observation(name, &action.service, format!("extraction of {key:?} failed: {message}")), context)),
            }
        }

        let observation = Observation {
            ok: true,
            protocol: "grpc".to_string(),
            action_name: name.to_string(),
            service: Some(action.service.clone()),
            status_code: Some(0),
            latency_ms,
            headers: HashMap::new(),
            body,
            errors: Vec::new(),
            metadata: HashMap::new(),
            attempts: Vec::new(),
            branch_condition: None,
            branch_result: None,
            branch_taken: None,
            condition_skipped: false,
        };

        Ok((observation, context))
    }
}

fn failed_observation(name: &str, service: &str, message: String) -> Observation {
    Observation {
        ok: false,
        protocol: "grpc".to_string(),
        action_name: name.to_string(),
        service: Some(service.to_string()),
        status_code: None,
        latency_ms: 0.0,
        headers: HashMap::new(),
        body: serde_json::Value::Null,
        errors: vec![message],
        metadata: HashMap::new(),
        attempts: Vec::new(),
        branch_condition: None,
        branch_result: None,
        branch_taken: None,
        condition_skipped: false,
    }
}

/// Resolves `service_name`'s `method_name` via `ServerReflectionInfo`,
/// populating a fresh [`DescriptorPool`] from the returned file descriptor
/// set and looking the method up by name.
async fn resolve_method(channel: tonic::transport::Channel, service_name: &str, method_name: &str) -> Result<MethodDescriptor, String> {
    let mut client = ServerReflectionClient::new(channel);
    let request = ServerReflectionRequest {
        host: String::new(),
        message_request: Some(MessageRequest::FileContainingSymbol(service_name.to_string())),
    };
    let request_stream = tokio_stream::once(request);
    let response = client.server_reflection_info(request_stream).await.map_err(|status| status.to_string())?;
    let mut inbound = response.into_inner();

    let mut pool = DescriptorPool::new();
    while let Some(message) = inbound.message().await.map_err(|status| status.to_string())? {
        match message.message_response {
            Some(MessageResponse::FileDescriptorResponse(response)) => {
                for raw in response.file_descriptor_proto {
                    let file_descriptor_proto = prost_types::FileDescriptorProto::decode(raw.as_slice()).map_err(|e| e.to_string())?;
                    pool.add_file_descriptor_proto(file_descriptor_proto).map_err(|e| e.to_string())?;
                }
            }
            Some(MessageResponse::ErrorResponse(error)) => return Err(error.error_message),
            _ => {}
        }
    }

    let service = pool.get_service_by_name(service_name).ok_or_else(|| format!("reflection did not resolve service {service_name:?}"))?;
    service.methods().find(|m| m.name() == method_name).ok_or_else(|| format!("service {service_name:?} has no method {method_name:?}"))
}

fn build_dynamic_message(descriptor: MessageDescriptor, body: &serde_json::Value) -> Result<DynamicMessage, String> {
    let mut deserializer = serde_json::Deserializer::from_str(&body.to_string());
    DynamicMessage::deserialize(descriptor, &mut deserializer).map_err(|e| e.to_string())
}

fn dynamic_message_to_json(message: &DynamicMessage) -> Result<serde_json::Value, String> {
    serde_json::to_value(message).map_err(|e| e.to_string())
}

fn extract_jsonpath(body: &serde_json::Value, path: &str) -> Result<serde_json::Value, String> {
    let jsonpath = JsonPath::parse(path).map_err(|e| e.to_string())?;
    let matches: Vec<&serde_json::Value> = jsonpath.query(body).all();
    match matches.len() {
        0 => Err(format!("no match for jsonpath {path:?}")),
        1 => Ok(matches[0].clone()),
        _ => Ok(serde_json::Value::Array(matches.into_iter().cloned().collect())),
    }
}

impl ActionRunner for GrpcRunner {
    async fn run(&self, action: &Action, context: WorkflowContext) -> Result<(Observation, WorkflowContext), RunnerError> {
        match action {
            Action::Grpc { name, action, .. } => self.run_grpc(name, action, context).await,
            other => Err(RunnerError::UnknownKind(other.kind().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use turbulence_client::ClientPool;
    use turbulence_core::{Service, ServiceConfig, Sut};

    fn grpc_action(method: &str) -> GrpcAction {
        GrpcAction { service: "orders".to_string(), method: method.to_string(), body: serde_json::Value::Null, metadata: HashMap::new(), extract: HashMap::new() }
    }

    fn sut_for_grpc() -> Sut {
        let mut services = HashMap::new();
        services.insert(
            "orders".to_string(),
            Service { name: "orders".to_string(), config: ServiceConfig::Grpc { host: "127.0.0.1".to_string(), port: 1, tls: false, timeout: Duration::from_secs(1) } },
        );
        Sut { name: "demo".to_string(), default_headers: HashMap::new(), services }
    }

    #[tokio::test]
    async fn malformed_method_reports_failure_without_network() {
        let pool = Arc::new(ClientPool::new(sut_for_grpc()));
        let runner = GrpcRunner::new(pool);
        let action = Action::Grpc { name: "place_order".to_string(), condition: None, action: grpc_action("not-a-valid-method") };
        let context = WorkflowContext::new("i1", "r1", "c1");

        let (observation, _) = runner.run(&action, context).await.unwrap();

        assert!(!observation.ok);
        assert_eq!(observation.errors.len(), 1);
        assert!(observation.errors[0].contains("malformed method"));
    }

    #[tokio::test]
    async fn resolve_method_reports_failure_for_unreachable_channel() {
        let channel = tonic::transport::Channel::from_static("http://127.0.0.1:1").connect_lazy();
        let result = resolve_method(channel, "orders.OrderService", "PlaceOrder").await;
        assert!(result.is_err());
    }
}
