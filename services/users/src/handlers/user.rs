use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::domain::types::{User, UserInput};
use crate::error::UsersServiceError;
use crate::state::AppState;
use crate::usecase::user::{
    ClearUsersUseCase, CreateUserUseCase, DeleteUserUseCase, GetUserUseCase, ListUsersUseCase,
    UpdateUserUseCase, UserLookup,
};

// ── Shared DTOs ──────────────────────────────────────────────────────────────

/// Body of create and update requests. Fields are optional here so missing
/// values surface as validation errors instead of extractor rejections.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i64>,
}

impl From<UserRequest> for UserInput {
    fn from(body: UserRequest) -> Self {
        Self {
            name: body.name,
            email: body.email,
            age: body.age,
        }
    }
}

fn user_input(
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<UserInput, UsersServiceError> {
    let Json(body) = payload.map_err(|e| UsersServiceError::Validation(e.body_text()))?;
    Ok(body.into())
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub age: i32,
    #[serde(serialize_with = "userhub_core::serde::to_rfc3339_ms")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(serialize_with = "userhub_core::serde::to_rfc3339_ms")]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            age: user.age,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// ── GET /users ───────────────────────────────────────────────────────────────

pub async fn list_users(State(state): State<AppState>) -> Result<Response, UsersServiceError> {
    let usecase = ListUsersUseCase {
        repo: state.user_repo(),
    };
    let users = usecase.execute().await?;
    if users.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let body: Vec<UserResponse> = users.into_iter().map(Into::into).collect();
    Ok(Json(body).into_response())
}

// ── GET /users/id/{id} ───────────────────────────────────────────────────────

pub async fn get_user_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<UserResponse>, UsersServiceError> {
    let usecase = GetUserUseCase {
        repo: state.user_repo(),
    };
    Ok(Json(usecase.by_id(id).await?.into()))
}

// ── GET /users/email/{email} ─────────────────────────────────────────────────

pub async fn get_user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<UserResponse>, UsersServiceError> {
    let usecase = GetUserUseCase {
        repo: state.user_repo(),
    };
    Ok(Json(usecase.by_email(&email).await?.into()))
}

// ── POST /users/create ───────────────────────────────────────────────────────

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), UsersServiceError> {
    let input = user_input(payload)?;
    let usecase = CreateUserUseCase {
        repo: state.user_repo(),
    };
    let user = usecase.execute(input).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

// ── PUT /users/update/byId/{id} ──────────────────────────────────────────────

pub async fn update_user_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, UsersServiceError> {
    let input = user_input(payload)?;
    let usecase = UpdateUserUseCase {
        repo: state.user_repo(),
    };
    Ok(Json(usecase.execute(UserLookup::Id(id), input).await?.into()))
}

// ── PUT /users/update/byEmail/{email} ────────────────────────────────────────

pub async fn update_user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, UsersServiceError> {
    let input = user_input(payload)?;
    let usecase = UpdateUserUseCase {
        repo: state.user_repo(),
    };
    Ok(Json(
        usecase.execute(UserLookup::Email(email), input).await?.into(),
    ))
}

// ── DELETE /users/delete/{id} ────────────────────────────────────────────────

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<UserResponse>, UsersServiceError> {
    let usecase = DeleteUserUseCase {
        repo: state.user_repo(),
    };
    Ok(Json(usecase.execute(id).await?.into()))
}

// ── DELETE /users/clear ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ClearUsersResponse {
    pub deleted: usize,
}

pub async fn clear_users(
    State(state): State<AppState>,
) -> Result<Json<ClearUsersResponse>, UsersServiceError> {
    let usecase = ClearUsersUseCase {
        repo: state.user_repo(),
    };
    let deleted = usecase.execute().await?;
    Ok(Json(ClearUsersResponse { deleted }))
}
