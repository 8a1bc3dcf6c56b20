use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{request::Parts, Method, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use parlor_shared::{ContactRequestId, GroupId, MessageId, NotificationId, UserId};
use parlor_store::{ContactRequest, Group, GroupMember, Message, Notification};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{AuthPrincipal, PrincipalDirectory};
use crate::coordinator::{
    AddMember, BulkRead, ChangeRole, Coordinator, CreateGroup, CreateNotification, GroupDetails,
    Page, ReadStatus, SendMessage, SubmitContactRequest, UpdateGroup,
};
use crate::error::ServerError;
use crate::read_state::ReadReceipt;
use crate::registry::SessionRegistry;
use crate::unread::UnreadCounters;
use crate::ws;

/// Header a client may set on a mutation to correlate the response with its
/// optimistic placeholder.
pub const CLIENT_REF_HEADER: &str = "x-client-ref";

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub registry: SessionRegistry,
    pub principals: Arc<PrincipalDirectory>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(ws::ws_handler))
        .route("/unread", get(unread_counts))
        // Groups
        .route("/groups", get(list_groups).post(create_group))
        .route(
            "/groups/{id}",
            get(get_group).patch(update_group).delete(delete_group),
        )
        .route("/groups/{id}/restore", post(restore_group))
        .route("/groups/{id}/permanent", delete(hard_delete_group))
        .route("/groups/{id}/members", post(add_member))
        .route(
            "/groups/{id}/members/{user_id}",
            delete(remove_member).patch(change_member_role),
        )
        .route("/groups/{id}/leave", post(leave_group))
        .route("/groups/{id}/messages", get(list_group_messages))
        .route("/groups/{id}/read", post(mark_group_read))
        // Messages
        .route("/messages", post(send_message))
        .route("/messages/direct/{peer}", get(list_direct_thread))
        .route("/messages/direct/{peer}/read", post(mark_direct_thread_read))
        .route(
            "/messages/{id}/read",
            get(read_status).post(mark_message_read),
        )
        .route("/messages/{id}", delete(delete_message))
        .route("/messages/{id}/permanent", delete(hard_delete_message))
        // Notifications
        .route(
            "/notifications",
            get(list_notifications).post(create_notification),
        )
        .route("/notifications/read-all", post(mark_all_notifications_read))
        .route("/notifications/{id}/read", post(mark_notification_read))
        // Contact inbox
        .route(
            "/contact-requests",
            get(list_contact_requests).post(submit_contact_request),
        )
        .route(
            "/contact-requests/{id}/read",
            post(mark_contact_request_read),
        )
        .route("/contact-requests/{id}", delete(delete_contact_request))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

// axum's own rejections answer with plain text. These wrappers route them
// through `ServerError` so every failure has the same JSON shape.

/// JSON request body.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Path parameters.
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(ApiPath(value))
    }
}

/// Query string.
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

/// The caller's `X-Client-Ref`, if any.
#[derive(Debug, Clone, Default)]
pub struct ClientRef(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientRef {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CLIENT_REF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(ClientRef(value))
    }
}

/// Mutation response body: the echoed correlation token and the resource.
#[derive(Debug, Serialize)]
pub struct Receipt<T> {
    pub client_ref: Option<String>,
    pub data: T,
}

type Reply<T> = Result<Json<Receipt<T>>, ServerError>;

fn reply<T>(client_ref: ClientRef, data: T) -> Reply<T> {
    Ok(Json(Receipt {
        client_ref: client_ref.0,
        data,
    }))
}

type Created<T> = Result<(StatusCode, Json<Receipt<T>>), ServerError>;

fn created<T>(client_ref: ClientRef, data: T) -> Created<T> {
    let receipt = Receipt {
        client_ref: client_ref.0,
        data,
    };
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Empty payload for mutations that return nothing but an acknowledgement.
#[derive(Debug, Serialize)]
struct Done {
    ok: bool,
}

const DONE: Done = Done { ok: true };

// ---------------------------------------------------------------------------
// Health & counters
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn unread_counts(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<UnreadCounters>, ServerError> {
    let counts = state.coordinator.unread().counts_for(principal.id).await?;
    Ok(Json(counts))
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

async fn list_groups(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<Vec<Group>>, ServerError> {
    Ok(Json(state.coordinator.list_my_groups(&principal).await?))
}

async fn create_group(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiJson(req): ApiJson<CreateGroup>,
) -> Created<GroupDetails> {
    let details = state.coordinator.create_group(&principal, req).await?;
    created(client_ref, details)
}

async fn get_group(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    ApiPath(id): ApiPath<GroupId>,
) -> Result<Json<GroupDetails>, ServerError> {
    Ok(Json(state.coordinator.get_group(&principal, id).await?))
}

async fn update_group(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath(id): ApiPath<GroupId>,
    ApiJson(req): ApiJson<UpdateGroup>,
) -> Reply<Group> {
    let group = state.coordinator.update_group(&principal, id, req).await?;
    reply(client_ref, group)
}

async fn delete_group(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath(id): ApiPath<GroupId>,
) -> Reply<Done> {
    state.coordinator.delete_group(&principal, id).await?;
    reply(client_ref, DONE)
}

async fn restore_group(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath(id): ApiPath<GroupId>,
) -> Reply<Group> {
    let group = state.coordinator.restore_group(&principal, id).await?;
    reply(client_ref, group)
}

async fn hard_delete_group(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath(id): ApiPath<GroupId>,
) -> Reply<Done> {
    state.coordinator.hard_delete_group(&principal, id).await?;
    reply(client_ref, DONE)
}

async fn add_member(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath(id): ApiPath<GroupId>,
    ApiJson(req): ApiJson<AddMember>,
) -> Reply<GroupMember> {
    let member = state.coordinator.add_member(&principal, id, req).await?;
    reply(client_ref, member)
}

async fn remove_member(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath((id, user_id)): ApiPath<(GroupId, UserId)>,
) -> Reply<Done> {
    state.coordinator.remove_member(&principal, id, user_id).await?;
    reply(client_ref, DONE)
}

async fn change_member_role(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath((id, user_id)): ApiPath<(GroupId, UserId)>,
    ApiJson(req): ApiJson<ChangeRole>,
) -> Reply<GroupMember> {
    let member = state
        .coordinator
        .change_member_role(&principal, id, user_id, req)
        .await?;
    reply(client_ref, member)
}

async fn leave_group(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath(id): ApiPath<GroupId>,
) -> Reply<Done> {
    state.coordinator.leave_group(&principal, id).await?;
    reply(client_ref, DONE)
}

async fn list_group_messages(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    ApiPath(id): ApiPath<GroupId>,
    ApiQuery(page): ApiQuery<Page>,
) -> Result<Json<Vec<Message>>, ServerError> {
    Ok(Json(
        state.coordinator.list_group_messages(&principal, id, page).await?,
    ))
}

async fn mark_group_read(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath(id): ApiPath<GroupId>,
) -> Reply<BulkRead> {
    let result = state.coordinator.mark_group_read(&principal, id).await?;
    reply(client_ref, result)
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

async fn send_message(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiJson(req): ApiJson<SendMessage>,
) -> Created<Message> {
    let message = state.coordinator.send_message(&principal, req).await?;
    created(client_ref, message)
}

async fn list_direct_thread(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    ApiPath(peer): ApiPath<UserId>,
    ApiQuery(page): ApiQuery<Page>,
) -> Result<Json<Vec<Message>>, ServerError> {
    Ok(Json(
        state.coordinator.list_direct_thread(&principal, peer, page).await?,
    ))
}

async fn mark_direct_thread_read(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath(peer): ApiPath<UserId>,
) -> Reply<BulkRead> {
    let result = state
        .coordinator
        .mark_direct_thread_read(&principal, peer)
        .await?;
    reply(client_ref, result)
}

async fn mark_message_read(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath(id): ApiPath<MessageId>,
) -> Reply<ReadReceipt> {
    let receipt = state.coordinator.mark_message_read(&principal, id).await?;
    reply(client_ref, receipt)
}

async fn read_status(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    ApiPath(id): ApiPath<MessageId>,
) -> Result<Json<ReadStatus>, ServerError> {
    Ok(Json(state.coordinator.read_status(&principal, id).await?))
}

async fn delete_message(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath(id): ApiPath<MessageId>,
) -> Reply<Done> {
    state.coordinator.delete_message(&principal, id).await?;
    reply(client_ref, DONE)
}

async fn hard_delete_message(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath(id): ApiPath<MessageId>,
) -> Reply<Done> {
    state.coordinator.hard_delete_message(&principal, id).await?;
    reply(client_ref, DONE)
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

async fn list_notifications(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    ApiQuery(page): ApiQuery<Page>,
) -> Result<Json<Vec<Notification>>, ServerError> {
    Ok(Json(
        state.coordinator.list_notifications(&principal, page).await?,
    ))
}

async fn create_notification(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiJson(req): ApiJson<CreateNotification>,
) -> Created<Notification> {
    let notification = state.coordinator.create_notification(&principal, req).await?;
    created(client_ref, notification)
}

async fn mark_notification_read(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath(id): ApiPath<NotificationId>,
) -> Reply<Notification> {
    let notification = state
        .coordinator
        .mark_notification_read(&principal, id)
        .await?;
    reply(client_ref, notification)
}

async fn mark_all_notifications_read(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
) -> Reply<Vec<Notification>> {
    let notifications = state
        .coordinator
        .mark_all_notifications_read(&principal)
        .await?;
    reply(client_ref, notifications)
}

// ---------------------------------------------------------------------------
// Contact inbox
// ---------------------------------------------------------------------------

/// Public: no bearer token required.
async fn submit_contact_request(
    State(state): State<AppState>,
    client_ref: ClientRef,
    ApiJson(req): ApiJson<SubmitContactRequest>,
) -> Created<ContactRequest> {
    let request = state.coordinator.submit_contact_request(req).await?;
    created(client_ref, request)
}

async fn list_contact_requests(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    ApiQuery(page): ApiQuery<Page>,
) -> Result<Json<Vec<ContactRequest>>, ServerError> {
    Ok(Json(
        state.coordinator.list_contact_requests(&principal, page).await?,
    ))
}

async fn mark_contact_request_read(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath(id): ApiPath<ContactRequestId>,
) -> Reply<ContactRequest> {
    let request = state
        .coordinator
        .mark_contact_request_read(&principal, id)
        .await?;
    reply(client_ref, request)
}

async fn delete_contact_request(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    client_ref: ClientRef,
    ApiPath(id): ApiPath<ContactRequestId>,
) -> Reply<Done> {
    state
        .coordinator
        .delete_contact_request(&principal, id)
        .await?;
    reply(client_ref, DONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use parlor_shared::Principal;
    use parlor_store::{Database, SharedDatabase};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const ALICE: &str = "alice-token";
    const BOB: &str = "bob-token";

    fn test_state() -> (AppState, Principal, Principal) {
        let alice = Principal::new(UserId::new());
        let bob = Principal::new(UserId::new());
        let db = SharedDatabase::new(Database::open_in_memory().unwrap());
        let registry = SessionRegistry::new(16);
        let coordinator = Coordinator::new(db, registry.clone(), None, Duration::from_secs(5));
        let principals = PrincipalDirectory::from_entries([
            (ALICE.to_string(), alice.clone()),
            (BOB.to_string(), bob.clone()),
        ]);
        let state = AppState {
            coordinator,
            registry,
            principals: Arc::new(principals),
        };
        (state, alice, bob)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (state, _, _) = test_state();
        let response = build_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let (state, _, _) = test_state();
        let response = build_router(state)
            .oneshot(Request::get("/unread").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["retryable"], false);
    }

    #[tokio::test]
    async fn test_send_message_echoes_client_ref() {
        let (state, _, bob) = test_state();
        let app = build_router(state);

        let mut request = post_json(
            "/messages",
            Some(ALICE),
            json!({ "recipient_id": bob.id, "content": "hi bob" }),
        );
        request
            .headers_mut()
            .insert(CLIENT_REF_HEADER, "tmp-42".parse().unwrap());

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["client_ref"], "tmp-42");
        assert_eq!(body["data"]["content"], "hi bob");
        assert_eq!(body["data"]["recipient_id"], bob.id.to_string());

        let response = app
            .oneshot(
                Request::get("/unread")
                    .header(header::AUTHORIZATION, format!("Bearer {BOB}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await["messages"], 1);
    }

    #[tokio::test]
    async fn test_both_targets_is_unprocessable() {
        let (state, _, bob) = test_state();
        let response = build_router(state)
            .oneshot(post_json(
                "/messages",
                Some(ALICE),
                json!({
                    "recipient_id": bob.id,
                    "group_id": GroupId::new(),
                    "content": "both",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["class"], "validation");
    }

    #[tokio::test]
    async fn test_group_lifecycle_over_http() {
        let (state, _, bob) = test_state();
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(post_json(
                "/groups",
                Some(ALICE),
                json!({ "name": "crew", "member_ids": [bob.id] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["client_ref"], Value::Null);
        let group_id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["members"].as_array().unwrap().len(), 2);

        // Bob is a plain member and cannot delete.
        let response = app
            .clone()
            .oneshot(
                Request::delete(format!("/groups/{group_id}"))
                    .header(header::AUTHORIZATION, format!("Bearer {BOB}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(
                Request::delete(format!("/groups/{group_id}"))
                    .header(header::AUTHORIZATION, format!("Bearer {ALICE}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(post_json(
                "/messages",
                Some(BOB),
                json!({ "group_id": group_id, "content": "anyone?" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    async fn assert_validation_error(response: axum::response::Response) {
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["class"], "validation");
        assert_eq!(body["retryable"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_body_is_typed_validation_error() {
        let (state, _, _) = test_state();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/messages")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {ALICE}"))
            .body(Body::from("{not json"))
            .unwrap();

        let response = build_router(state).oneshot(request).await.unwrap();
        assert_validation_error(response).await;
    }

    #[tokio::test]
    async fn test_malformed_path_id_is_typed_validation_error() {
        let (state, _, _) = test_state();
        let response = build_router(state)
            .oneshot(
                Request::get("/groups/not-a-uuid")
                    .header(header::AUTHORIZATION, format!("Bearer {ALICE}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_validation_error(response).await;
    }

    #[tokio::test]
    async fn test_malformed_query_is_typed_validation_error() {
        let (state, _, _) = test_state();
        let response = build_router(state)
            .oneshot(
                Request::get("/notifications?limit=lots")
                    .header(header::AUTHORIZATION, format!("Bearer {ALICE}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_validation_error(response).await;
    }

    #[tokio::test]
    async fn test_contact_submission_is_public() {
        let (state, _, _) = test_state();
        let response = build_router(state)
            .oneshot(post_json(
                "/contact-requests",
                None,
                json!({ "name": "Ada", "email": "ada@example.com", "message": "hello" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
