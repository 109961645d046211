use tokio::task::{JoinError, JoinHandle};
use tracing::error;

/// Awaits a background task, logging a panic or cancellation under `name`.
pub async fn join_logged<T>(name: &str, handle: JoinHandle<T>) -> Result<T, JoinError> {
    let joined = handle.await;
    if let Err(e) = &joined {
        error!(task = name, panicked = e.is_panic(), error = %e, "background task failed");
    }
    joined
}
