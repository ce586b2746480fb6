use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::decode;
use crate::transport::body_message;
use crate::{ApiError, ApiRequest, Transport};

/// Credentials for one domain of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainToken {
    pub token: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Single(DomainToken),
    /// The account spans several domains; the caller picks one.
    MultiDomain(Vec<DomainToken>),
}

#[derive(Clone)]
pub struct AuthService {
    transport: Arc<dyn Transport>,
}

impl AuthService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn login(&self, email: &str) -> Result<LoginOutcome, ApiError> {
        let request = ApiRequest::post("/api/auth/token-by-email").json(json!({ "email": email }));
        let body = self.transport.send(request).await?.body;

        if body.get("success").and_then(Value::as_bool) != Some(true) {
            return Err(ApiError::application(
                body_message(&body).unwrap_or_else(|| "Login failed".to_string()),
            ));
        }
        match body.get("data") {
            Some(data @ Value::Array(_)) => Ok(LoginOutcome::MultiDomain(decode(data.clone())?)),
            Some(data) => Ok(LoginOutcome::Single(decode(data.clone())?)),
            None => Err(ApiError::application("Login failed")),
        }
    }
}
