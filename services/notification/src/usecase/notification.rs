use tracing::info;

use crate::domain::repository::Mailer;
use crate::error::NotificationError;

pub struct SendNotificationInput {
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// Manual send outside the event flow; no dedup record is written.
pub struct SendNotificationUseCase<M: Mailer> {
    pub mailer: M,
}

impl<M: Mailer> SendNotificationUseCase<M> {
    pub async fn execute(&self, input: SendNotificationInput) -> Result<(), NotificationError> {
        let mut problems = Vec::new();
        let email = required(input.email, "email", &mut problems);
        let subject = required(input.subject, "subject", &mut problems);
        let message = required(input.message, "message", &mut problems);
        if !problems.is_empty() {
            return Err(NotificationError::Validation(problems.join(" ")));
        }

        self.mailer.send_email(&email, &subject, &message).await?;
        info!(to = %email, %subject, "manual notification sent");
        Ok(())
    }
}

fn required(value: Option<String>, field: &str, problems: &mut Vec<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => {
            problems.push(format!("{field} - must not be empty;"));
            String::new()
        }
    }
}
