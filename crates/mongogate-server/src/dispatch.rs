use crate::metrics::{STORE_OP_SECONDS, STORE_SESSIONS_OPEN};
use crate::AppState;
use mongogate_core::{GateError, Operation, Outcome, Result};
use mongogate_storage::StoreSession;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Open a session, run one operation and close the session again. The close
/// happens whatever the operation returned, timeouts included, and also when
/// the caller drops this future half way (client went away).
pub async fn run(app: &AppState, op: &Operation) -> Result<Outcome> {
    let _timer = STORE_OP_SECONDS
        .with_label_values(&[op.name()])
        .start_timer();
    app.store.validate(op)?;
    let session = timed(app.store_timeout, app.store.connect()).await?;
    let guard = SessionGuard::new(session, app.store_timeout);

    debug!("executing {:?}", op);
    let outcome = timed(app.store_timeout, guard.session.execute(op)).await;
    guard.close().await;
    outcome
}

/// Owns an open session until it is closed. Dropping the guard with the
/// session still open hands the close to a background task.
struct SessionGuard {
    session: Arc<dyn StoreSession>,
    limit: Duration,
    closed: bool,
}

impl SessionGuard {
    fn new(session: Box<dyn StoreSession>, limit: Duration) -> Self {
        STORE_SESSIONS_OPEN.inc();
        Self {
            session: Arc::from(session),
            limit,
            closed: false,
        }
    }

    async fn close(mut self) {
        self.closed = true;
        release(self.session.clone(), self.limit).await;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        debug!("request dropped with a session open; closing in background");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(release(self.session.clone(), self.limit));
            }
            Err(_) => {
                warn!("no runtime left to close store session");
                STORE_SESSIONS_OPEN.dec();
            }
        }
    }
}

async fn release(session: Arc<dyn StoreSession>, limit: Duration) {
    if let Err(e) = timed(limit, session.close()).await {
        warn!("closing store session failed: {}", e);
    }
    STORE_SESSIONS_OPEN.dec();
}

async fn timed<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| GateError::Timeout(limit))?
}
