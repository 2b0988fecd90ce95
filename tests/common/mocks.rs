use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use xml_tuples::{DefinitionDocument, DefinitionSource, TupleError, TypeDefinition, TypeIdentity};

/// Definition source with scripted responses and a request log
pub struct MockDefinitionSource {
    responses: Arc<Mutex<HashMap<TypeIdentity, MockResponse>>>,
    request_log: Arc<Mutex<Vec<DefinitionRequest>>>,
    default_delay: Duration,
}

#[derive(Clone, Debug)]
pub struct MockResponse {
    pub text: String,
    pub delay: Option<Duration>,
    pub failure: Option<MockFailure>,
}

#[derive(Clone, Debug)]
pub enum MockFailure {
    Timeout,
    Server(u16),
    Cache(String),
}

#[derive(Clone, Debug)]
pub struct DefinitionRequest {
    pub identity: TypeIdentity,
    pub timestamp: Instant,
}

impl MockDefinitionSource {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            request_log: Arc::new(Mutex::new(Vec::new())),
            default_delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn add_response(&self, identity: &str, response: MockResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(TypeIdentity::new(identity), response);
    }

    pub fn add_definition(&self, definition: &TypeDefinition) {
        self.add_response(
            definition.name.as_str(),
            MockResponse::success(definition.to_markup()),
        );
    }

    pub fn add_failure(&self, identity: &str, failure: MockFailure) {
        self.add_response(identity, MockResponse::failure(failure));
    }

    pub fn requests(&self) -> Vec<DefinitionRequest> {
        self.request_log.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_log.lock().unwrap().len()
    }

    /// Number of requests made for one identity
    pub fn requests_for(&self, identity: &str) -> usize {
        self.request_log
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.identity.as_str() == identity)
            .count()
    }

    pub fn clear_requests(&self) {
        self.request_log.lock().unwrap().clear();
    }
}

impl Default for MockDefinitionSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DefinitionSource for MockDefinitionSource {
    async fn load(&self, identity: &TypeIdentity) -> xml_tuples::Result<DefinitionDocument> {
        self.request_log.lock().unwrap().push(DefinitionRequest {
            identity: identity.clone(),
            timestamp: Instant::now(),
        });

        let response = self.responses.lock().unwrap().get(identity).cloned();
        let Some(response) = response else {
            tokio::time::sleep(self.default_delay).await;
            return Err(TupleError::DefinitionNotFound {
                identity: identity.clone(),
            });
        };

        tokio::time::sleep(response.delay.unwrap_or(self.default_delay)).await;

        match response.failure {
            Some(MockFailure::Timeout) => Err(TupleError::Timeout {
                url: format!("mock://{}", identity),
                timeout_seconds: 30,
            }),
            Some(MockFailure::Server(status)) => Err(TupleError::HttpStatus {
                url: format!("mock://{}", identity),
                status,
                message: "Mock server error".to_string(),
            }),
            Some(MockFailure::Cache(message)) => Err(TupleError::Cache(message)),
            None => Ok(DefinitionDocument {
                identity: identity.clone(),
                text: response.text,
                origin: format!("mock://{}", identity),
            }),
        }
    }
}

impl MockResponse {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delay: None,
            failure: None,
        }
    }

    pub fn failure(failure: MockFailure) -> Self {
        Self {
            text: String::new(),
            delay: None,
            failure: Some(failure),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}
