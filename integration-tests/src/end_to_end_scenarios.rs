//! End-to-end scenarios: a small document service protected by policies

use crate::test_utils::*;
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::{Method, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::get,
};
use denyallow_core::{
    AllowAll, AllowAuthenticated, AllowStaff, AllowSuperuser, CheckError, CheckList, Policy,
    RequestInfo, any_of, from_fn as check_fn, predicate,
};
use denyallow_middleware::{
    GuardConfig, PermissionGuard, RequestContext, Rejection, permission_middleware,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Document {
    id: u64,
    owner: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct DocumentInput {
    title: String,
}

#[derive(Default)]
struct DocumentStore {
    next_id: AtomicU64,
    documents: RwLock<HashMap<u64, Document>>,
}

impl DocumentStore {
    async fn insert(&self, owner: &str, title: &str) -> Document {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let doc = Document {
            id,
            owner: owner.to_string(),
            title: title.to_string(),
        };
        self.documents.write().await.insert(id, doc.clone());
        doc
    }
}

type Store = Arc<DocumentStore>;
type DocumentGuard = PermissionGuard<Document>;

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response()
}

async fn list_documents(State(store): State<Store>) -> Json<Vec<Document>> {
    let mut docs: Vec<Document> = store.documents.read().await.values().cloned().collect();
    docs.sort_by_key(|doc| doc.id);
    Json(docs)
}

async fn create_document(
    State(store): State<Store>,
    ctx: RequestContext,
    Json(input): Json<DocumentInput>,
) -> Response {
    let owner = ctx
        .principal()
        .map(|p| p.user_id.clone())
        .unwrap_or_default();
    let doc = store.insert(&owner, &input.title).await;
    (StatusCode::CREATED, Json(doc)).into_response()
}

async fn load(store: &Store, id: u64) -> Result<Document, Response> {
    store
        .documents
        .read()
        .await
        .get(&id)
        .cloned()
        .ok_or_else(not_found)
}

async fn show_document(
    State(store): State<Store>,
    Path(id): Path<u64>,
    Extension(guard): Extension<DocumentGuard>,
    ctx: RequestContext,
) -> Result<Json<Document>, Response> {
    let doc = load(&store, id).await?;
    guard
        .check_object(&ctx, &doc)
        .map_err(IntoResponse::into_response)?;
    Ok(Json(doc))
}

async fn update_document(
    State(store): State<Store>,
    Path(id): Path<u64>,
    Extension(guard): Extension<DocumentGuard>,
    ctx: RequestContext,
    Json(input): Json<DocumentInput>,
) -> Result<Json<Document>, Response> {
    let mut doc = load(&store, id).await?;
    guard
        .check_object(&ctx, &doc)
        .map_err(IntoResponse::into_response)?;

    doc.title = input.title;
    store.documents.write().await.insert(id, doc.clone());
    Ok(Json(doc))
}

async fn delete_document(
    State(store): State<Store>,
    Path(id): Path<u64>,
    Extension(guard): Extension<DocumentGuard>,
    ctx: RequestContext,
) -> Result<StatusCode, Response> {
    let doc = load(&store, id).await?;
    guard
        .check_object(&ctx, &doc)
        .map_err(IntoResponse::into_response)?;

    store.documents.write().await.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}

async fn stats(State(store): State<Store>) -> Json<serde_json::Value> {
    let count = store.documents.read().await.len();
    Json(json!({ "documents": count }))
}

fn is_owner() -> CheckList<RequestContext, Document> {
    any_of![predicate(
        "is_owner",
        |ctx: &RequestContext, doc: Option<&Document>| {
            matches!((ctx.principal(), doc), (Some(p), Some(doc)) if p.user_id == doc.owner)
        },
    )]
}

fn document_policy() -> Policy<RequestContext, Document> {
    let is_editor = predicate("is_editor", |ctx: &RequestContext, _: Option<&Document>| {
        ctx.principal().is_some_and(|p| p.has_role("editor"))
    });

    let mut may_change = is_owner();
    may_change.push(is_editor);

    let mut may_delete = is_owner();
    may_delete.push(AllowStaff);

    Policy::crud()
        .rw(any_of![AllowSuperuser])
        .read(any_of![AllowAll])
        .add(any_of![AllowAuthenticated])
        .change(any_of![AllowAuthenticated])
        .delete(any_of![AllowAuthenticated])
        .object_rw(any_of![AllowSuperuser])
        .object_read(any_of![AllowAll])
        .object_change(may_change)
        .object_delete(may_delete)
}

fn stats_policy(config: &GuardConfig) -> anyhow::Result<Policy<RequestContext>> {
    let tenant = check_fn("tenant_header", |ctx: &RequestContext, _: Option<&()>| {
        match ctx.header("x-tenant") {
            Some("acme") => Ok(true),
            Some(_) => Ok(false),
            None => Err(CheckError::missing_context("x-tenant header is required")),
        }
    });

    Ok(Policy::uniform()
        .rw(any_of![config.authorized_key_check()?, AllowStaff, tenant])
        .with_message("Service credentials required."))
}

async fn documents_app(config: GuardConfig) -> anyhow::Result<(Router, Store)> {
    init_tracing();

    let store: Store = Arc::new(DocumentStore::default());
    store.insert("alice", "Alice's notes").await;
    store.insert("bob", "Bob's plans").await;

    let documents = PermissionGuard::new(document_policy(), config.clone())?;
    let internal = PermissionGuard::new(stats_policy(&config)?, config)?;

    let documents_routes = Router::new()
        .route("/documents", get(list_documents).post(create_document))
        .route(
            "/documents/:id",
            get(show_document)
                .put(update_document)
                .patch(update_document)
                .delete(delete_document),
        )
        .layer(from_fn(permission_middleware(documents)));

    let internal_routes = Router::new()
        .route("/internal/stats", get(stats))
        .layer(from_fn(permission_middleware(internal)));

    let app = Router::new()
        .merge(documents_routes)
        .merge(internal_routes)
        .with_state(store.clone())
        .layer(from_fn(header_auth));

    Ok((app, store))
}

fn service_config() -> GuardConfig {
    GuardConfig::new().with_authorized_key("internal-service-key")
}

#[tokio::test]
async fn test_anonymous_can_read() -> anyhow::Result<()> {
    let (app, _) = documents_app(GuardConfig::new()).await?;

    let response = send(&app, TestRequest::new(Method::GET, "/documents")).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_array().map(Vec::len), Some(2));

    let response = send(&app, TestRequest::new(Method::GET, "/documents/1")).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["owner"], "alice");
    Ok(())
}

#[tokio::test]
async fn test_anonymous_cannot_create() -> anyhow::Result<()> {
    let (app, _) = documents_app(GuardConfig::new()).await?;

    let request = TestRequest::new(Method::POST, "/documents").json(json!({"title": "spam"}));
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.detail(), Some("Permission denied."));
    Ok(())
}

#[tokio::test]
async fn test_anonymous_unauthorized_when_configured() -> anyhow::Result<()> {
    let config = GuardConfig::new().with_anonymous_unauthorized(true);
    let (app, _) = documents_app(config).await?;

    let request = TestRequest::new(Method::POST, "/documents").json(json!({"title": "spam"}));
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    // Authenticated callers that fail a check still get 403
    let request = TestRequest::new(Method::PUT, "/documents/1")
        .user("bob")
        .json(json!({"title": "mine now"}));
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_member_creates_and_owner_updates() -> anyhow::Result<()> {
    let (app, store) = documents_app(GuardConfig::new()).await?;

    let request = TestRequest::new(Method::POST, "/documents")
        .user("carol")
        .json(json!({"title": "Draft"}));
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["owner"], "carol");
    let id = response.body["id"].as_u64().unwrap_or_default();

    let uri = format!("/documents/{id}");
    let request = TestRequest::new(Method::PATCH, &uri)
        .user("carol")
        .json(json!({"title": "Final"}));
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["title"], "Final");

    let request = TestRequest::new(Method::PUT, &uri)
        .user("mallory")
        .json(json!({"title": "Defaced"}));
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let stored = store.documents.read().await.get(&id).map(|d| d.title.clone());
    assert_eq!(stored.as_deref(), Some("Final"));
    Ok(())
}

#[tokio::test]
async fn test_editor_role_can_change_any_document() -> anyhow::Result<()> {
    let (app, _) = documents_app(GuardConfig::new()).await?;

    let request = TestRequest::new(Method::PUT, "/documents/1")
        .user("erin")
        .roles("reviewer, editor")
        .json(json!({"title": "Edited"}));
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["owner"], "alice");
    Ok(())
}

#[tokio::test]
async fn test_delete_requires_owner_or_staff() -> anyhow::Result<()> {
    let (app, store) = documents_app(GuardConfig::new()).await?;

    let request = TestRequest::new(Method::DELETE, "/documents/1").user("bob");
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let request = TestRequest::new(Method::DELETE, "/documents/1").user("alice");
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let request = TestRequest::new(Method::DELETE, "/documents/2")
        .user("sam")
        .staff();
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    assert!(store.documents.read().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_superuser_passes_every_level() -> anyhow::Result<()> {
    let (app, _) = documents_app(GuardConfig::new()).await?;

    let request = TestRequest::new(Method::PUT, "/documents/2")
        .user("root")
        .superuser()
        .json(json!({"title": "Audited"}));
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["title"], "Audited");
    Ok(())
}

#[tokio::test]
async fn test_missing_document_is_not_found_after_view_check() -> anyhow::Result<()> {
    let (app, _) = documents_app(GuardConfig::new()).await?;

    let response = send(&app, TestRequest::new(Method::GET, "/documents/99")).await?;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = send(&app, TestRequest::new(Method::DELETE, "/documents/99")).await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_service_key_grants_internal_access() -> anyhow::Result<()> {
    let (app, _) = documents_app(service_config()).await?;

    let request = TestRequest::new(Method::GET, "/internal/stats")
        .header("authorization", "internal-service-key");
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["documents"], 2);

    let request = TestRequest::new(Method::GET, "/internal/stats")
        .header("authorization", "guessed-key")
        .header("x-tenant", "other");
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.detail(), Some("Service credentials required."));
    Ok(())
}

#[tokio::test]
async fn test_check_error_is_internal_error() -> anyhow::Result<()> {
    let (app, _) = documents_app(service_config()).await?;

    // Neither the key nor staff grants, and the tenant check cannot decide
    let request = TestRequest::new(Method::GET, "/internal/stats").user("bob");
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.detail(), Some("Permission check failed."));

    // A granting check earlier in the list short-circuits the failing one
    let request = TestRequest::new(Method::GET, "/internal/stats").user("sam").staff();
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_config_from_environment_lookup() -> anyhow::Result<()> {
    let vars = HashMap::from([
        ("DENYALLOW_AUTHORIZED_KEYS", "first-key, second-key"),
        ("DENYALLOW_DENY_MESSAGE", "Access refused."),
    ]);
    let mut config = GuardConfig::new();
    config.load_from(|name| {
        vars.get(name)
            .map(|value| value.to_string())
            .ok_or(std::env::VarError::NotPresent)
    })?;
    config.validate()?;

    let (app, _) = documents_app(config).await?;

    let request = TestRequest::new(Method::GET, "/internal/stats")
        .header("authorization", "second-key");
    assert_eq!(send(&app, request).await?.status, StatusCode::OK);

    let request = TestRequest::new(Method::POST, "/documents").json(json!({"title": "x"}));
    let response = send(&app, request).await?;
    assert_eq!(response.detail(), Some("Access refused."));
    Ok(())
}

#[test]
fn test_invalid_policy_is_rejected_at_startup() {
    use assert_matches::assert_matches;
    use denyallow_middleware::GuardError;

    let policy: Policy<RequestContext, Document> =
        Policy::read_write().add(any_of![AllowAuthenticated]);
    let err = PermissionGuard::new(policy, GuardConfig::new()).unwrap_err();
    assert!(err.is_config());
    assert_matches!(
        err,
        GuardError::Check(CheckError::ImproperlyConfigured(ref msg)) if msg.contains("`add`")
    );
}

#[test]
fn test_rejection_is_a_response() {
    let response = Rejection::Forbidden("No.".to_string()).into_response();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
