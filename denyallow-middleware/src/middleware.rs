//! Axum middleware running permission policies

use crate::config::GuardConfig;
use crate::context::RequestContext;
use crate::error::GuardResult;
use axum::{
    Json,
    extract::Request,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use denyallow_core::{CheckResult, Decision, Identity, Policy, RequestInfo};
use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Detail returned when a check fails to reach a decision
pub const CHECK_FAILED_DETAIL: &str = "Permission check failed.";

/// Challenge sent in `WWW-Authenticate` with every `401`.
///
/// Hosts using another scheme can replace the header in an outer layer.
pub const AUTHENTICATE_CHALLENGE: &str = "Bearer";

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Anonymous caller denied, answered with `401`
    Unauthorized(String),
    /// Caller denied, answered with `403`
    Forbidden(String),
    /// A check returned an error, answered with `500`
    CheckFailed,
}

impl Rejection {
    /// HTTP status for this rejection
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::CheckFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent to the client
    pub fn detail(&self) -> &str {
        match self {
            Self::Unauthorized(message) | Self::Forbidden(message) => message,
            Self::CheckFailed => CHECK_FAILED_DETAIL,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status(), self.detail())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            detail: self.detail(),
        });
        let mut response = (self.status(), body).into_response();
        if let Self::Unauthorized(_) = self {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static(AUTHENTICATE_CHALLENGE),
            );
        }
        response
    }
}

#[derive(Debug, Clone, Copy)]
enum Level {
    View,
    Object,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Object => "object",
        }
    }
}

/// Runs a [`Policy`] for the routes it is layered on.
///
/// The view-level check runs in [`process`](Self::process) before the
/// handler. The guard then places a clone of itself in the request
/// extensions so the handler can run [`check_object`](Self::check_object)
/// once it has loaded the target.
pub struct PermissionGuard<T: ?Sized = ()> {
    policy: Arc<Policy<RequestContext, T>>,
    config: Arc<GuardConfig>,
}

impl<T: ?Sized> Clone for PermissionGuard<T> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for PermissionGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionGuard")
            .field("policy", &self.policy)
            .field("config", &self.config)
            .finish()
    }
}

impl<T: ?Sized + 'static> PermissionGuard<T> {
    /// Create a guard after validating the policy and the configuration
    pub fn new(policy: Policy<RequestContext, T>, config: GuardConfig) -> GuardResult<Self> {
        policy.validate()?;
        config.validate()?;

        Ok(Self {
            policy: Arc::new(policy),
            config: Arc::new(config),
        })
    }

    /// The guarded policy
    pub fn policy(&self) -> &Policy<RequestContext, T> {
        &self.policy
    }

    /// The guard configuration
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Run the view-level check
    pub fn authorize(&self, ctx: &RequestContext) -> Result<(), Rejection> {
        let result = self.policy.has_permission(ctx);
        self.outcome(ctx, result, Level::View)
    }

    /// Run the object-level check against a loaded target
    pub fn check_object(&self, ctx: &RequestContext, obj: &T) -> Result<(), Rejection> {
        let result = self.policy.has_object_permission(ctx, obj);
        self.outcome(ctx, result, Level::Object)
    }

    /// Process the request
    pub async fn process(&self, mut request: Request, next: Next) -> Result<Response, Rejection> {
        let ctx = RequestContext::from_request(&request);
        self.authorize(&ctx)?;

        request.extensions_mut().insert(self.clone());
        Ok(next.run(request).await)
    }

    fn deny_message(&self) -> &str {
        self.policy
            .custom_message()
            .unwrap_or(&self.config.deny_message)
    }

    fn outcome(
        &self,
        ctx: &RequestContext,
        result: CheckResult<Decision>,
        level: Level,
    ) -> Result<(), Rejection> {
        match result {
            Ok(Decision::Allow) => Ok(()),
            Ok(Decision::Deny) => {
                let anonymous = !ctx.is_authenticated();
                debug!(
                    method = ctx.method(),
                    level = level.as_str(),
                    anonymous,
                    "Permission denied"
                );

                let message = self.deny_message().to_string();
                if anonymous && self.config.anonymous_status_unauthorized {
                    Err(Rejection::Unauthorized(message))
                } else {
                    Err(Rejection::Forbidden(message))
                }
            }
            Err(e) => {
                error!(
                    method = ctx.method(),
                    level = level.as_str(),
                    error = %e,
                    "Permission check failed"
                );
                Err(Rejection::CheckFailed)
            }
        }
    }
}

/// Middleware function for use with [`axum::middleware::from_fn`]
///
/// # Example
/// ```rust,no_run
/// use axum::{Router, routing::get, middleware::from_fn};
/// use denyallow_core::{AllowAuthenticated, Policy, any_of};
/// use denyallow_middleware::*;
///
/// let policy = Policy::uniform().rw(any_of![AllowAuthenticated]);
/// let guard: PermissionGuard = PermissionGuard::new(policy, GuardConfig::new()).unwrap();
///
/// let app: Router = Router::new()
///     .route("/", get(|| async { "Hello, permitted world!" }))
///     .layer(from_fn(permission_middleware(guard)));
/// ```
pub fn permission_middleware<T>(
    guard: PermissionGuard<T>,
) -> impl Fn(Request, Next) -> BoxFuture<'static, Result<Response, Rejection>> + Clone
where
    T: ?Sized + 'static,
{
    move |req, next| {
        let guard = guard.clone();
        Box::pin(async move { guard.process(req, next).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Principal;
    use axum::{
        Extension, Router,
        body::{Body, to_bytes},
        http::{HeaderMap, Method},
        middleware::from_fn,
        routing::get,
    };
    use denyallow_core::{
        AllowAll, AllowAuthenticated, AllowStaff, CheckError, CheckList, any_of,
        from_fn as check_fn, predicate,
    };
    use tower::ServiceExt;

    async fn test_handler() -> &'static str {
        "Hello, World!"
    }

    async fn fake_auth(mut request: Request, next: Next) -> Response {
        if let Some(user) = request
            .headers()
            .get("x-user")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
        {
            let mut principal = Principal::new(user);
            if request.headers().contains_key("x-staff") {
                principal = principal.with_staff();
            }
            request.extensions_mut().insert(principal);
        }
        next.run(request).await
    }

    fn app(guard: PermissionGuard) -> Router {
        Router::new()
            .route("/", get(test_handler).post(test_handler))
            .layer(from_fn(permission_middleware(guard)))
            .layer(from_fn(fake_auth))
    }

    fn request(method: Method, user: Option<&str>) -> Request {
        let mut builder = Request::builder().method(method).uri("/");
        if let Some(user) = user {
            builder = builder.header("x-user", user);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn detail(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["detail"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_allowed_request_reaches_handler() {
        let policy = Policy::uniform().rw(any_of![AllowAuthenticated]);
        let guard = PermissionGuard::new(policy, GuardConfig::new()).unwrap();

        let response = app(guard)
            .oneshot(request(Method::GET, Some("alice")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_denied_request_gets_forbidden() {
        let policy = Policy::uniform().rw(any_of![AllowAuthenticated]);
        let guard = PermissionGuard::new(policy, GuardConfig::new()).unwrap();

        let response = app(guard)
            .oneshot(request(Method::GET, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(detail(response).await, "Permission denied.");
    }

    #[tokio::test]
    async fn test_anonymous_gets_unauthorized_when_enabled() {
        let policy = Policy::uniform().rw(any_of![AllowAuthenticated]);
        let config = GuardConfig::new().with_anonymous_unauthorized(true);
        let guard = PermissionGuard::new(policy, config).unwrap();

        let response = app(guard.clone())
            .oneshot(request(Method::GET, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            AUTHENTICATE_CHALLENGE
        );

        // Authenticated callers are still forbidden, not unauthorized
        let staff_only = Policy::uniform().rw(any_of![AllowStaff]);
        let guard = PermissionGuard::new(staff_only, guard.config().clone()).unwrap();
        let response = app(guard)
            .oneshot(request(Method::GET, Some("alice")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }

    #[tokio::test]
    async fn test_failing_check_gets_internal_error() {
        let lookup = check_fn("lookup", |_: &RequestContext, _: Option<&()>| {
            Err(CheckError::failed("lookup", "store offline"))
        });
        let policy = Policy::uniform().rw(any_of![lookup]);
        let guard = PermissionGuard::new(policy, GuardConfig::new()).unwrap();

        let response = app(guard)
            .oneshot(request(Method::GET, Some("alice")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(detail(response).await, "Permission check failed.");
    }

    #[tokio::test]
    async fn test_message_precedence() {
        let config = GuardConfig::new().with_deny_message("Go away.");

        let guard = PermissionGuard::new(Policy::uniform(), config.clone()).unwrap();
        let response = app(guard)
            .oneshot(request(Method::GET, None))
            .await
            .unwrap();
        assert_eq!(detail(response).await, "Go away.");

        let policy = Policy::uniform().with_message("Staff only.");
        let guard = PermissionGuard::new(policy, config).unwrap();
        let response = app(guard)
            .oneshot(request(Method::GET, None))
            .await
            .unwrap();
        assert_eq!(detail(response).await, "Staff only.");
    }

    #[tokio::test]
    async fn test_read_write_policy_through_router() {
        let policy = Policy::read_write()
            .read(any_of![AllowAll])
            .write(any_of![AllowStaff]);
        let guard = PermissionGuard::new(policy, GuardConfig::new()).unwrap();
        let app = app(guard);

        let response = app
            .clone()
            .oneshot(request(Method::GET, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request(Method::POST, Some("alice")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let staff = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("x-user", "sam")
            .header("x-staff", "1")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(staff).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_handler_runs_object_check() {
        struct Document {
            owner: &'static str,
        }

        let owns: CheckList<RequestContext, Document> =
            any_of![predicate("is_owner", |ctx: &RequestContext, doc: Option<&Document>| {
                matches!((ctx.principal(), doc), (Some(p), Some(doc)) if p.user_id == doc.owner)
            })];
        let policy = Policy::uniform()
            .rw(any_of![AllowAuthenticated])
            .object_rw(owns);
        let guard = PermissionGuard::new(policy, GuardConfig::new()).unwrap();

        let app = Router::new()
            .route(
                "/",
                get(
                    |Extension(guard): Extension<PermissionGuard<Document>>,
                     ctx: RequestContext| async move {
                        let doc = Document { owner: "alice" };
                        guard.check_object(&ctx, &doc)?;
                        Ok::<_, Rejection>("document")
                    },
                ),
            )
            .layer(from_fn(permission_middleware(guard)))
            .layer(from_fn(fake_auth));

        let response = app
            .clone()
            .oneshot(request(Method::GET, Some("alice")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(Method::GET, Some("bob")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_new_rejects_invalid_policy() {
        let policy: Policy<RequestContext> = Policy::uniform().write(any_of![AllowAll]);
        let err = PermissionGuard::new(policy, GuardConfig::new()).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_rejection_mapping() {
        let ctx = RequestContext::new(Method::GET, HeaderMap::new(), None);
        let guard: PermissionGuard =
            PermissionGuard::new(Policy::uniform(), GuardConfig::new()).unwrap();

        let rejection = guard.authorize(&ctx).unwrap_err();
        assert_eq!(rejection, Rejection::Forbidden("Permission denied.".to_string()));
        assert_eq!(rejection.status(), StatusCode::FORBIDDEN);
        assert_eq!(Rejection::CheckFailed.detail(), CHECK_FAILED_DETAIL);
        assert_eq!(
            Rejection::Unauthorized("x".into()).to_string(),
            "401 Unauthorized: x"
        );
    }
}
