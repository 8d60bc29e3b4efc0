use anyhow::Context as _;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, FromQueryResult, IntoActiveModel as _, QueryFilter, QueryOrder, SqlErr,
    Statement, TransactionError, TransactionTrait,
};

use userhub_events::EventType;
use userhub_users_schema::users;

use crate::domain::repository::UserRepository;
use crate::domain::types::{NewUser, OutboxEvent, User};
use crate::error::UsersServiceError;
use crate::infra::outbox::record_mutation;

// ── User repository ──────────────────────────────────────────────────────────

// Events are built only from the rows a delete actually removed.
const DELETE_BY_ID_SQL: &str = "DELETE FROM users WHERE id = $1 RETURNING *";
const DELETE_ALL_SQL: &str = "DELETE FROM users RETURNING *";

#[derive(Clone)]
pub struct DbUserRepository {
    pub db: DatabaseConnection,
}

impl UserRepository for DbUserRepository {
    async fn list(&self) -> Result<Vec<User>, UsersServiceError> {
        let models = users::Entity::find()
            .order_by_asc(users::Column::Id)
            .all(&self.db)
            .await
            .context("list users")?;
        Ok(models.into_iter().map(user_from_model).collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, UsersServiceError> {
        let model = users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find user by id")?;
        Ok(model.map(user_from_model))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UsersServiceError> {
        let model = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
            .context("find user by email")?;
        Ok(model.map(user_from_model))
    }

    async fn create_with_outbox(
        &self,
        user: &NewUser,
    ) -> Result<(User, OutboxEvent), UsersServiceError> {
        self.db
            .transaction::<_, (User, OutboxEvent), DbErr>(|txn| {
                let user = user.clone();
                Box::pin(async move {
                    let now = Utc::now();
                    let model = users::ActiveModel {
                        name: Set(user.name),
                        email: Set(user.email),
                        age: Set(user.age),
                        created_at: Set(now),
                        updated_at: Set(now),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;
                    let created = user_from_model(model);
                    let event = record_mutation(txn, &created, EventType::Created).await?;
                    Ok((created, event))
                })
            })
            .await
            .map_err(|e| write_error(e, "create user with outbox"))
    }

    async fn update_by_id(
        &self,
        id: i32,
        changes: &NewUser,
    ) -> Result<Option<User>, UsersServiceError> {
        let Some(model) = users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find user for update by id")?
        else {
            return Ok(None);
        };
        self.apply_update(model, changes).await.map(Some)
    }

    async fn update_by_email(
        &self,
        email: &str,
        changes: &NewUser,
    ) -> Result<Option<User>, UsersServiceError> {
        let Some(model) = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
            .context("find user for update by email")?
        else {
            return Ok(None);
        };
        self.apply_update(model, changes).await.map(Some)
    }

    async fn delete_by_id_with_outbox(
        &self,
        id: i32,
    ) -> Result<Option<(User, OutboxEvent)>, UsersServiceError> {
        self.db
            .transaction::<_, Option<(User, OutboxEvent)>, DbErr>(|txn| {
                Box::pin(async move {
                    let removed = users::Model::find_by_statement(Statement::from_sql_and_values(
                        txn.get_database_backend(),
                        DELETE_BY_ID_SQL,
                        [id.into()],
                    ))
                    .one(txn)
                    .await?;
                    let Some(model) = removed else {
                        return Ok(None);
                    };
                    let deleted = user_from_model(model);
                    let event = record_mutation(txn, &deleted, EventType::Deleted).await?;
                    Ok(Some((deleted, event)))
                })
            })
            .await
            .map_err(|e| write_error(e, "delete user with outbox"))
    }

    async fn clear_with_outbox(&self) -> Result<Vec<OutboxEvent>, UsersServiceError> {
        self.db
            .transaction::<_, Vec<OutboxEvent>, DbErr>(|txn| {
                Box::pin(async move {
                    let mut removed = users::Model::find_by_statement(Statement::from_string(
                        txn.get_database_backend(),
                        DELETE_ALL_SQL,
                    ))
                    .all(txn)
                    .await?;
                    removed.sort_by_key(|m| m.id);
                    let mut events = Vec::with_capacity(removed.len());
                    for model in removed {
                        let deleted = user_from_model(model);
                        events.push(record_mutation(txn, &deleted, EventType::Deleted).await?);
                    }
                    Ok(events)
                })
            })
            .await
            .map_err(|e| write_error(e, "clear users with outbox"))
    }
}

impl DbUserRepository {
    async fn apply_update(
        &self,
        model: users::Model,
        changes: &NewUser,
    ) -> Result<User, UsersServiceError> {
        let mut am = model.into_active_model();
        am.name = Set(changes.name.clone());
        am.email = Set(changes.email.clone());
        am.age = Set(changes.age);
        am.updated_at = Set(Utc::now());
        match am.update(&self.db).await {
            Ok(updated) => Ok(user_from_model(updated)),
            Err(e) if is_unique_violation(&e) => Err(UsersServiceError::UserAlreadyExists),
            Err(e) => Err(anyhow::Error::new(e).context("update user").into()),
        }
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Email uniqueness violations become a conflict; anything else is internal.
fn write_error(err: TransactionError<DbErr>, what: &'static str) -> UsersServiceError {
    let unique = match &err {
        TransactionError::Connection(e) | TransactionError::Transaction(e) => {
            is_unique_violation(e)
        }
    };
    if unique {
        return UsersServiceError::UserAlreadyExists;
    }
    anyhow::Error::new(err).context(what).into()
}

fn user_from_model(model: users::Model) -> User {
    User {
        id: model.id,
        name: model.name,
        email: model.email,
        age: model.age,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}
