use crate::domain::repository::OutboxRepository;
use crate::domain::types::OutboxStats;
use crate::error::UsersServiceError;

pub struct GetOutboxStatsUseCase<O: OutboxRepository> {
    pub outbox: O,
}

impl<O: OutboxRepository> GetOutboxStatsUseCase<O> {
    pub async fn execute(&self) -> Result<OutboxStats, UsersServiceError> {
        self.outbox.stats().await
    }
}
