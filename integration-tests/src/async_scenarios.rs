//! Scenarios for checks that await a backing store

use crate::test_utils::*;
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::get,
};
use denyallow_core::{
    AllowSuperuser, AsyncCheck, Blocking, CheckError, CheckResult, Decision, evaluate_async,
    evaluate_async_verdict,
};
use denyallow_middleware::{Principal, Rejection, RequestContext};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Project {
    id: u64,
    name: String,
}

/// Project memberships, as a database would hold them
#[derive(Default)]
struct Memberships {
    members: RwLock<HashMap<u64, HashSet<String>>>,
    lookups: AtomicUsize,
    offline: RwLock<bool>,
}

impl Memberships {
    async fn add(&self, project: u64, user: &str) {
        self.members
            .write()
            .await
            .entry(project)
            .or_default()
            .insert(user.to_string());
    }

    async fn is_member(&self, project: u64, user: &str) -> CheckResult<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if *self.offline.read().await {
            return Err(CheckError::failed("project_member", "membership store offline"));
        }

        let members = self.members.read().await;
        Ok(members.get(&project).is_some_and(|m| m.contains(user)))
    }
}

struct ProjectMember {
    store: Arc<Memberships>,
}

#[async_trait]
impl AsyncCheck<RequestContext, Project> for ProjectMember {
    fn name(&self) -> &str {
        "project_member"
    }

    async fn check(&self, ctx: &RequestContext, project: Option<&Project>) -> CheckResult<bool> {
        let (Some(principal), Some(project)) = (ctx.principal(), project) else {
            return Ok(false);
        };
        self.store.is_member(project.id, &principal.user_id).await
    }
}

#[derive(Clone)]
struct AppState {
    checks: Arc<Vec<Arc<dyn AsyncCheck<RequestContext, Project>>>>,
}

async fn board(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    ctx: RequestContext,
) -> Result<Json<serde_json::Value>, Response> {
    let project = Project {
        id,
        name: format!("project-{id}"),
    };

    match evaluate_async(state.checks.as_slice(), &ctx, Some(&project)).await {
        Ok(Decision::Allow) => Ok(Json(json!({ "project": project.name }))),
        Ok(Decision::Deny) => {
            Err(Rejection::Forbidden("Not a project member.".to_string()).into_response())
        }
        Err(e) => {
            tracing::error!(error = %e, "membership check failed");
            Err(Rejection::CheckFailed.into_response())
        }
    }
}

async fn projects_app() -> (Router, Arc<Memberships>) {
    init_tracing();

    let store = Arc::new(Memberships::default());
    store.add(7, "alice").await;

    let checks: Vec<Arc<dyn AsyncCheck<RequestContext, Project>>> = vec![
        Arc::new(Blocking(AllowSuperuser)),
        Arc::new(ProjectMember {
            store: store.clone(),
        }),
    ];

    let state = AppState {
        checks: Arc::new(checks),
    };

    let app = Router::new()
        .route("/projects/:id/board", get(board))
        .with_state(state)
        .layer(from_fn(header_auth));

    (app, store)
}

#[tokio::test]
async fn test_member_sees_board() -> anyhow::Result<()> {
    let (app, _) = projects_app().await;

    let request = TestRequest::new(Method::GET, "/projects/7/board").user("alice");
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["project"], "project-7");

    let request = TestRequest::new(Method::GET, "/projects/8/board").user("alice");
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.detail(), Some("Not a project member."));
    Ok(())
}

#[tokio::test]
async fn test_superuser_skips_membership_lookup() -> anyhow::Result<()> {
    let (app, store) = projects_app().await;

    let request = TestRequest::new(Method::GET, "/projects/8/board")
        .user("root")
        .superuser();
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_store_failure_is_internal_error() -> anyhow::Result<()> {
    let (app, store) = projects_app().await;
    *store.offline.write().await = true;

    let request = TestRequest::new(Method::GET, "/projects/7/board").user("alice");
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.detail(), Some("Permission check failed."));
    Ok(())
}

#[tokio::test]
async fn test_membership_change_takes_effect_immediately() -> anyhow::Result<()> {
    let (app, store) = projects_app().await;

    let request = TestRequest::new(Method::GET, "/projects/7/board").user("bob");
    assert_eq!(send(&app, request.clone()).await?.status, StatusCode::FORBIDDEN);

    store.add(7, "bob").await;
    assert_eq!(send(&app, request).await?.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_requests_share_checks() -> anyhow::Result<()> {
    let (app, store) = projects_app().await;
    store.add(7, "bob").await;

    let users = ["alice", "bob", "carol", "dave"];
    let responses = futures::future::join_all(users.iter().map(|user| {
        let app = app.clone();
        async move {
            let request = TestRequest::new(Method::GET, "/projects/7/board").user(user);
            send(&app, request).await
        }
    }))
    .await;

    let mut allowed = 0;
    for response in responses {
        if response?.status == StatusCode::OK {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 2);
    assert_eq!(store.lookups.load(Ordering::SeqCst), 4);
    Ok(())
}

#[tokio::test]
async fn test_verdict_names_granting_check() -> anyhow::Result<()> {
    let (_, store) = projects_app().await;
    let checks: Vec<Arc<dyn AsyncCheck<RequestContext, Project>>> = vec![
        Arc::new(Blocking(AllowSuperuser)),
        Arc::new(ProjectMember { store }),
    ];

    let ctx = RequestContext::new(
        Method::GET,
        HeaderMap::new(),
        Some(Principal::new("alice")),
    );
    let project = Project {
        id: 7,
        name: "seven".to_string(),
    };

    let verdict = evaluate_async_verdict(&checks, &ctx, Some(&project)).await?;
    assert_eq!(verdict.granted_by.as_deref(), Some("project_member"));
    assert_eq!(verdict.evaluated, 2);
    Ok(())
}
