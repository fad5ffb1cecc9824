//! One-shot flash messages carried in the session.
//!
//! A POST handler queues a message before redirecting; the next rendered
//! page takes the whole queue.

use tower_sessions::Session;

use crate::models::FlashMessage;
use crate::models::session::keys;

/// Queue a flash message for the next rendered page.
///
/// Best-effort: a session failure is logged and the message dropped, so a
/// completed operation is never reported as failed.
pub async fn push_flash(session: &Session, message: FlashMessage) {
    let result = async {
        let mut queue: Vec<FlashMessage> = session.get(keys::FLASH).await?.unwrap_or_default();
        queue.push(message);
        session.insert(keys::FLASH, queue).await
    }
    .await;

    if let Err(e) = result {
        tracing::warn!(error = %e, "Failed to store flash message");
    }
}

/// Remove and return all pending flash messages.
pub async fn take_flashes(session: &Session) -> Vec<FlashMessage> {
    match session.remove::<Vec<FlashMessage>>(keys::FLASH).await {
        Ok(queue) => queue.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read flash messages");
            Vec::new()
        }
    }
}
