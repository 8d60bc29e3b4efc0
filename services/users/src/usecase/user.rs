use tracing::info;

use crate::domain::repository::UserRepository;
use crate::domain::types::{NewUser, User, UserInput, format_field_errors};
use crate::error::UsersServiceError;

fn validated(input: UserInput) -> Result<NewUser, UsersServiceError> {
    input
        .validate()
        .map_err(|errors| UsersServiceError::Validation(format_field_errors(&errors)))
}

/// Which user an update targets.
#[derive(Debug, Clone)]
pub enum UserLookup {
    Id(i32),
    Email(String),
}

// ── ListUsers ────────────────────────────────────────────────────────────────

pub struct ListUsersUseCase<R: UserRepository> {
    pub repo: R,
}

impl<R: UserRepository> ListUsersUseCase<R> {
    pub async fn execute(&self) -> Result<Vec<User>, UsersServiceError> {
        self.repo.list().await
    }
}

// ── GetUser ──────────────────────────────────────────────────────────────────

pub struct GetUserUseCase<R: UserRepository> {
    pub repo: R,
}

impl<R: UserRepository> GetUserUseCase<R> {
    pub async fn by_id(&self, id: i32) -> Result<User, UsersServiceError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(UsersServiceError::UserNotFoundById)
    }

    pub async fn by_email(&self, email: &str) -> Result<User, UsersServiceError> {
        self.repo
            .find_by_email(email)
            .await?
            .ok_or(UsersServiceError::UserNotFoundByEmail)
    }
}

// ── CreateUser ───────────────────────────────────────────────────────────────

pub struct CreateUserUseCase<R: UserRepository> {
    pub repo: R,
}

impl<R: UserRepository> CreateUserUseCase<R> {
    pub async fn execute(&self, input: UserInput) -> Result<User, UsersServiceError> {
        let new_user = validated(input)?;
        if self.repo.find_by_email(&new_user.email).await?.is_some() {
            return Err(UsersServiceError::UserAlreadyExists);
        }
        let (user, event) = self.repo.create_with_outbox(&new_user).await?;
        info!(user_id = user.id, event_id = %event.id, "user created");
        Ok(user)
    }
}

// ── UpdateUser ───────────────────────────────────────────────────────────────

/// Full replacement of name, email and age. Emits no event.
pub struct UpdateUserUseCase<R: UserRepository> {
    pub repo: R,
}

impl<R: UserRepository> UpdateUserUseCase<R> {
    pub async fn execute(
        &self,
        target: UserLookup,
        input: UserInput,
    ) -> Result<User, UsersServiceError> {
        let changes = validated(input)?;
        match target {
            UserLookup::Id(id) => self
                .repo
                .update_by_id(id, &changes)
                .await?
                .ok_or(UsersServiceError::UserNotFoundById),
            UserLookup::Email(email) => self
                .repo
                .update_by_email(&email, &changes)
                .await?
                .ok_or(UsersServiceError::UserNotFoundByEmail),
        }
    }
}

// ── DeleteUser ───────────────────────────────────────────────────────────────

pub struct DeleteUserUseCase<R: UserRepository> {
    pub repo: R,
}

impl<R: UserRepository> DeleteUserUseCase<R> {
    pub async fn execute(&self, id: i32) -> Result<User, UsersServiceError> {
        let (user, event) = self
            .repo
            .delete_by_id_with_outbox(id)
            .await?
            .ok_or(UsersServiceError::UserNotFoundById)?;
        info!(user_id = user.id, event_id = %event.id, "user deleted");
        Ok(user)
    }
}

// ── ClearUsers ───────────────────────────────────────────────────────────────

pub struct ClearUsersUseCase<R: UserRepository> {
    pub repo: R,
}

impl<R: UserRepository> ClearUsersUseCase<R> {
    /// Returns how many users were removed.
    pub async fn execute(&self) -> Result<usize, UsersServiceError> {
        let events = self.repo.clear_with_outbox().await?;
        info!(deleted = events.len(), "users cleared");
        Ok(events.len())
    }
}
