//! Request context threaded through every flow decision.

use url::form_urlencoded;

/// A pending protocol request id, tagged with its protocol prefix.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RequestId {
    Oidc(String),
    Saml(String),
}

impl RequestId {
    /// Parses a raw `requestId` parameter. Anything without a known
    /// protocol prefix is rejected.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(id) = raw.strip_prefix("oidc_") {
            if !id.is_empty() {
                return Some(Self::Oidc(id.to_string()));
            }
        }
        if let Some(id) = raw.strip_prefix("saml_") {
            if !id.is_empty() {
                return Some(Self::Saml(id.to_string()));
            }
        }
        None
    }

    /// The full prefixed value, as carried in URLs.
    #[must_use]
    pub fn as_param(&self) -> String {
        match self {
            Self::Oidc(id) => format!("oidc_{id}"),
            Self::Saml(id) => format!("saml_{id}"),
        }
    }

    /// The backend-side id without the protocol prefix.
    #[must_use]
    pub fn raw_id(&self) -> &str {
        match self {
            Self::Oidc(id) | Self::Saml(id) => id,
        }
    }
}

/// Organization and request-id context preserved across flow redirects.
/// Both are optional; URLs only carry what is present.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FlowContext {
    pub organization: Option<String>,
    pub request_id: Option<String>,
}

impl FlowContext {
    #[must_use]
    pub fn new(organization: Option<String>, request_id: Option<String>) -> Self {
        Self {
            organization,
            request_id,
        }
    }

    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Builds a relative URL carrying `params` followed by the context.
    /// Parameter order is stable: explicit params, then `organization`,
    /// then `requestId`.
    #[must_use]
    pub fn url(&self, path: &str, params: &[(&str, &str)]) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in params {
            serializer.append_pair(key, value);
        }
        if let Some(organization) = &self.organization {
            serializer.append_pair("organization", organization);
        }
        if let Some(request_id) = &self.request_id {
            serializer.append_pair("requestId", request_id);
        }
        let query = serializer.finish();
        if query.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{query}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FlowContext, RequestId};

    #[test]
    fn parses_prefixed_request_ids() {
        assert_eq!(
            RequestId::parse("oidc_V2_abc123"),
            Some(RequestId::Oidc("V2_abc123".to_string()))
        );
        assert_eq!(
            RequestId::parse("saml_req42"),
            Some(RequestId::Saml("req42".to_string()))
        );
        assert_eq!(RequestId::parse("device_xyz"), None);
        assert_eq!(RequestId::parse("oidc_"), None);
        assert_eq!(RequestId::parse(""), None);
    }

    #[test]
    fn as_param_round_trips() {
        let id = RequestId::parse("oidc_abc").unwrap();
        assert_eq!(id.as_param(), "oidc_abc");
        assert_eq!(id.raw_id(), "abc");
    }

    #[test]
    fn url_orders_params_and_encodes() {
        let ctx = FlowContext::new(
            Some("org1".to_string()),
            Some("oidc_req1".to_string()),
        );
        assert_eq!(
            ctx.url("/password", &[("loginName", "user@example.com")]),
            "/password?loginName=user%40example.com&organization=org1&requestId=oidc_req1"
        );
    }

    #[test]
    fn url_without_context_or_params_is_bare() {
        assert_eq!(FlowContext::default().url("/register", &[]), "/register");
    }
}
