//! Users service to mailbox: relay output fed through the notification consumer.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use userhub_notification::consumer::{ConsumerSettings, IdempotentConsumer};
use userhub_notification::domain::repository::{ConsumedEventStore, DeadLetterSink, Mailer};
use userhub_notification::domain::types::{
    AckReason, ConsumedEventRecord, DeadLetterEntry, Delivery, Disposition,
};
use userhub_notification::error::NotificationError;
use userhub_users::domain::types::UserInput;
use userhub_users::usecase::user::{CreateUserUseCase, DeleteUserUseCase};

use crate::helpers::{FlakyPublisher, immediate_settings, new_store, relay, user_repo};

#[derive(Clone, Default)]
struct SeenIds(Arc<Mutex<HashSet<Uuid>>>);

impl ConsumedEventStore for SeenIds {
    async fn is_processed(&self, event_id: Uuid) -> Result<bool, NotificationError> {
        Ok(self.0.lock().unwrap().contains(&event_id))
    }

    async fn record(&self, record: &ConsumedEventRecord) -> Result<bool, NotificationError> {
        Ok(self.0.lock().unwrap().insert(record.event_id))
    }
}

#[derive(Clone, Default)]
struct Inbox(Arc<Mutex<Vec<(String, String)>>>);

impl Mailer for Inbox {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        _body: &str,
    ) -> Result<(), NotificationError> {
        self.0.lock().unwrap().push((to.into(), subject.into()));
        Ok(())
    }
}

struct NoDeadLetters;

impl DeadLetterSink for NoDeadLetters {
    async fn publish(&self, entry: &DeadLetterEntry) -> Result<(), NotificationError> {
        panic!("unexpected dead letter: {entry:?}");
    }
}

fn input(email: &str) -> UserInput {
    UserInput {
        name: Some("Alice".into()),
        email: Some(email.into()),
        age: Some(30),
    }
}

async fn deliver(
    consumer: &IdempotentConsumer<SeenIds, Inbox, NoDeadLetters>,
    publisher: &FlakyPublisher,
) -> Vec<Disposition> {
    let mut out = Vec::new();
    for (i, event) in publisher.published().iter().enumerate() {
        let payload = serde_json::to_vec(event).unwrap();
        let delivery = Delivery {
            subject: "users-events-topic.0".into(),
            stream_sequence: i as u64 + 1,
            count: 1,
        };
        out.push(consumer.on_payload(&payload, &delivery).await);
    }
    out
}

#[tokio::test]
async fn should_mail_user_on_create_and_delete() {
    let store = new_store();
    let created = CreateUserUseCase {
        repo: user_repo(&store),
    }
    .execute(input("a@x.com"))
    .await
    .unwrap();
    DeleteUserUseCase {
        repo: user_repo(&store),
    }
    .execute(created.id)
    .await
    .unwrap();

    let publisher = FlakyPublisher::reliable();
    relay(&store, publisher.clone(), immediate_settings())
        .relay_once()
        .await
        .unwrap();
    // Head-of-line: the delete becomes claimable once the create is out.
    relay(&store, publisher.clone(), immediate_settings())
        .relay_once()
        .await
        .unwrap();

    let inbox = Inbox::default();
    let consumer = IdempotentConsumer::new(
        SeenIds::default(),
        inbox.clone(),
        NoDeadLetters,
        ConsumerSettings::default(),
    );
    let dispositions = deliver(&consumer, &publisher).await;

    assert!(
        dispositions
            .iter()
            .all(|d| *d == Disposition::Ack(AckReason::Recorded))
    );
    assert_eq!(
        *inbox.0.lock().unwrap(),
        vec![
            ("a@x.com".to_owned(), "Аккаунт создан".to_owned()),
            ("a@x.com".to_owned(), "Аккаунт удалён".to_owned()),
        ]
    );
}

#[tokio::test]
async fn should_mail_once_when_event_is_delivered_twice() {
    let store = new_store();
    CreateUserUseCase {
        repo: user_repo(&store),
    }
    .execute(input("a@x.com"))
    .await
    .unwrap();

    let publisher = FlakyPublisher::reliable();
    relay(&store, publisher.clone(), immediate_settings())
        .relay_once()
        .await
        .unwrap();

    let inbox = Inbox::default();
    let consumer = IdempotentConsumer::new(
        SeenIds::default(),
        inbox.clone(),
        NoDeadLetters,
        ConsumerSettings::default(),
    );
    let first = deliver(&consumer, &publisher).await;
    let second = deliver(&consumer, &publisher).await;

    assert_eq!(first, vec![Disposition::Ack(AckReason::Recorded)]);
    assert_eq!(second, vec![Disposition::Ack(AckReason::Skipped)]);
    assert_eq!(inbox.0.lock().unwrap().len(), 1);
}
