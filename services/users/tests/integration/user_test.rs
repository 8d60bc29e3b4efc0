use userhub_events::EventType;
use userhub_users::domain::types::{OutboxStatus, UserInput};
use userhub_users::error::UsersServiceError;
use userhub_users::usecase::user::{
    ClearUsersUseCase, CreateUserUseCase, DeleteUserUseCase, ListUsersUseCase, UpdateUserUseCase,
    UserLookup,
};

use crate::helpers::{new_store, outbox_events, user_repo};

fn input(name: &str, email: &str, age: i64) -> UserInput {
    UserInput {
        name: Some(name.into()),
        email: Some(email.into()),
        age: Some(age),
    }
}

#[tokio::test]
async fn should_write_one_created_event_per_create() {
    let store = new_store();
    let uc = CreateUserUseCase {
        repo: user_repo(&store),
    };

    let user = uc.execute(input("Alice", "a@x.com", 30)).await.unwrap();
    assert_eq!(user.email, "a@x.com");

    let events = outbox_events(&store);
    assert_eq!(events.len(), 1, "expected exactly one outbox row");
    let row = &events[0];
    assert_eq!(row.status, OutboxStatus::Pending);
    assert_eq!(row.aggregate_key, "a@x.com");
    let event = row.decode().unwrap();
    assert_eq!(event.event_type, EventType::Created);
    assert_eq!(event.event_id, row.id);
}

#[tokio::test]
async fn should_write_nothing_when_email_is_taken() {
    let store = new_store();
    let uc = CreateUserUseCase {
        repo: user_repo(&store),
    };
    uc.execute(input("Alice", "a@x.com", 30)).await.unwrap();

    let result = uc.execute(input("Other", "a@x.com", 22)).await;
    assert!(
        matches!(result, Err(UsersServiceError::UserAlreadyExists)),
        "expected UserAlreadyExists, got {result:?}"
    );
    assert_eq!(outbox_events(&store).len(), 1);
}

#[tokio::test]
async fn should_write_nothing_when_validation_fails() {
    let store = new_store();
    let uc = CreateUserUseCase {
        repo: user_repo(&store),
    };
    let result = uc.execute(input("Alice", "a@x.com", -1)).await;
    assert!(matches!(result, Err(UsersServiceError::Validation(_))));
    assert!(outbox_events(&store).is_empty());
    assert!(store.lock().unwrap().users.is_empty());
}

#[tokio::test]
async fn should_update_without_emitting_events() {
    let store = new_store();
    let user = CreateUserUseCase {
        repo: user_repo(&store),
    }
    .execute(input("Alice", "a@x.com", 30))
    .await
    .unwrap();

    let uc = UpdateUserUseCase {
        repo: user_repo(&store),
    };
    let updated = uc
        .execute(UserLookup::Id(user.id), input("Alice B", "a@x.com", 31))
        .await
        .unwrap();
    assert_eq!(updated.name, "Alice B");
    assert_eq!(updated.age, 31);

    let by_email = uc
        .execute(
            UserLookup::Email("a@x.com".into()),
            input("Alice C", "alice@x.com", 32),
        )
        .await
        .unwrap();
    assert_eq!(by_email.email, "alice@x.com");

    assert_eq!(outbox_events(&store).len(), 1, "updates must not emit events");
}

#[tokio::test]
async fn should_write_deleted_event_on_delete() {
    let store = new_store();
    let user = CreateUserUseCase {
        repo: user_repo(&store),
    }
    .execute(input("Alice", "a@x.com", 30))
    .await
    .unwrap();

    let uc = DeleteUserUseCase {
        repo: user_repo(&store),
    };
    uc.execute(user.id).await.unwrap();

    let events = outbox_events(&store);
    assert_eq!(events.len(), 2);
    let deleted = events[1].decode().unwrap();
    assert_eq!(deleted.event_type, EventType::Deleted);
    assert_eq!(deleted.email, "a@x.com");

    let again = uc.execute(user.id).await;
    assert!(matches!(again, Err(UsersServiceError::UserNotFoundById)));
    assert_eq!(outbox_events(&store).len(), 2);
}

#[tokio::test]
async fn should_write_deleted_event_per_user_on_clear() {
    let store = new_store();
    let create = CreateUserUseCase {
        repo: user_repo(&store),
    };
    for (name, email) in [("A", "a@x.com"), ("B", "b@x.com"), ("C", "c@x.com")] {
        create.execute(input(name, email, 20)).await.unwrap();
    }

    let removed = ClearUsersUseCase {
        repo: user_repo(&store),
    }
    .execute()
    .await
    .unwrap();
    assert_eq!(removed, 3);

    let deleted: Vec<_> = outbox_events(&store)
        .iter()
        .map(|r| r.decode().unwrap())
        .filter(|e| e.event_type == EventType::Deleted)
        .map(|e| e.email)
        .collect();
    assert_eq!(deleted, vec!["a@x.com", "b@x.com", "c@x.com"]);

    let users = ListUsersUseCase {
        repo: user_repo(&store),
    }
    .execute()
    .await
    .unwrap();
    assert!(users.is_empty());
}
