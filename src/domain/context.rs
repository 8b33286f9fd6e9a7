//! Operation Context
//!
//! Metadata about the current operation, used for audit and tracing.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

/// Context for a mutating operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Authenticated principal (account id) the API layer resolved,
    /// from the X-Principal-Id header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<Uuid>,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,

    /// Client IP address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self {
            principal_id: None,
            correlation_id: None,
            client_ip: None,
        }
    }

    pub fn with_principal(mut self, principal_id: Uuid) -> Self {
        self.principal_id = Some(principal_id);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let principal_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        let context = OperationContext::new()
            .with_principal(principal_id)
            .with_correlation_id(correlation_id);

        assert_eq!(context.principal_id, Some(principal_id));
        assert_eq!(context.correlation_id, Some(correlation_id));
    }

    #[test]
    fn test_ensure_correlation_id() {
        let mut context = OperationContext::new();
        assert!(context.correlation_id.is_none());

        let id = context.ensure_correlation_id();
        assert_eq!(context.correlation_id, Some(id));

        let id2 = context.ensure_correlation_id();
        assert_eq!(id, id2);
    }
}
