//! Integration tests for the denyallow permission crates
//!
//! This crate drives complete axum applications through the permission
//! middleware and checks the HTTP answers end to end.

#![allow(unused_imports)] // Allow unused imports in integration tests

pub mod async_scenarios;
pub mod end_to_end_scenarios;

/// Common test utilities for integration tests
pub mod test_utils {
    use axum::{
        Router,
        body::{Body, to_bytes},
        extract::Request,
        http::{Method, StatusCode},
        middleware::Next,
        response::Response,
    };
    use denyallow_middleware::Principal;
    use tower::ServiceExt;
    use tracing_subscriber::EnvFilter;

    /// Header naming the authenticated user
    pub const USER_HEADER: &str = "x-user";
    /// Comma separated roles of the user
    pub const ROLES_HEADER: &str = "x-roles";
    /// Present when the user is staff
    pub const STAFF_HEADER: &str = "x-staff";
    /// Present when the user is a superuser
    pub const SUPERUSER_HEADER: &str = "x-superuser";

    /// Install a tracing subscriber that writes through the test harness
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("denyallow_core=debug,denyallow_middleware=debug"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }

    /// Stand-in for an authentication layer: trusts the `x-user` headers
    pub async fn header_auth(mut request: Request, next: Next) -> Response {
        let headers = request.headers();
        let user = headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(String::from);

        if let Some(user) = user {
            let mut principal = Principal::new(user);
            if headers.contains_key(STAFF_HEADER) {
                principal = principal.with_staff();
            }
            if headers.contains_key(SUPERUSER_HEADER) {
                principal = principal.with_superuser();
            }
            if let Some(roles) = headers.get(ROLES_HEADER).and_then(|v| v.to_str().ok()) {
                for role in roles.split(',').map(str::trim).filter(|r| !r.is_empty()) {
                    principal = principal.with_role(role);
                }
            }
            request.extensions_mut().insert(principal);
        }

        next.run(request).await
    }

    /// Builder for test requests
    #[derive(Debug, Clone)]
    pub struct TestRequest {
        method: Method,
        uri: String,
        headers: Vec<(String, String)>,
        body: Option<serde_json::Value>,
    }

    impl TestRequest {
        /// Create a request without identity
        pub fn new(method: Method, uri: &str) -> Self {
            Self {
                method,
                uri: uri.to_string(),
                headers: Vec::new(),
                body: None,
            }
        }

        /// Authenticate as `user`
        pub fn user(self, user: &str) -> Self {
            self.header(USER_HEADER, user)
        }

        /// Mark the user as staff
        pub fn staff(self) -> Self {
            self.header(STAFF_HEADER, "1")
        }

        /// Mark the user as superuser
        pub fn superuser(self) -> Self {
            self.header(SUPERUSER_HEADER, "1")
        }

        /// Give the user roles
        pub fn roles(self, roles: &str) -> Self {
            self.header(ROLES_HEADER, roles)
        }

        /// Add a header
        pub fn header(mut self, name: &str, value: &str) -> Self {
            self.headers.push((name.to_string(), value.to_string()));
            self
        }

        /// Attach a JSON body
        pub fn json(mut self, body: serde_json::Value) -> Self {
            self.body = Some(body);
            self
        }

        /// Build the request
        pub fn build(self) -> anyhow::Result<Request> {
            let mut builder = Request::builder().method(self.method).uri(self.uri);
            for (name, value) in &self.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let request = match self.body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body)?))?,
                None => builder.body(Body::empty())?,
            };
            Ok(request)
        }
    }

    /// A response status with its decoded JSON body
    #[derive(Debug)]
    pub struct TestResponse {
        /// Response status
        pub status: StatusCode,
        /// JSON body, `Null` when empty
        pub body: serde_json::Value,
    }

    impl TestResponse {
        /// The `detail` field of an error body
        pub fn detail(&self) -> Option<&str> {
            self.body.get("detail").and_then(|d| d.as_str())
        }
    }

    /// Send a request through the app
    pub async fn send(app: &Router, request: TestRequest) -> anyhow::Result<TestResponse> {
        let response = app.clone().oneshot(request.build()?).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;

        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()))
        };

        Ok(TestResponse { status, body })
    }
}
