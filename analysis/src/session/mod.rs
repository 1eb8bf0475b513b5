//! The analysis session: one engine, one run at a time.
//!
//! An actor task owns the engine and the current run. Callers talk to it
//! through a [`SessionHandle`]; each run reports back on its own event
//! channel. A run moves `Idle -> Running -> Completed | Cancelled`, or to
//! `Failed` if the engine goes away.

mod actor;
mod commands;
mod events;
mod handle;
mod state;

use std::sync::Arc;

use engine::EngineTransport;
use tokio::sync::mpsc;

use crate::cache::EvalCache;
use actor::run_session_actor;
pub use events::RunEvent;
pub use handle::SessionHandle;
pub use state::{RunPhase, SessionConfig};
use state::SessionState;

/// Spawn a session actor with its own evaluation cache.
pub fn spawn_session<E>(engine: E, config: SessionConfig) -> SessionHandle
where
    E: EngineTransport + 'static,
{
    let cache = Arc::new(EvalCache::new(config.cache_opening_window));
    spawn_session_with_cache(engine, cache, config)
}

/// Spawn a session actor that shares `cache` with other sessions.
pub fn spawn_session_with_cache<E>(
    engine: E,
    cache: Arc<EvalCache>,
    config: SessionConfig,
) -> SessionHandle
where
    E: EngineTransport + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let state = SessionState::new(Box::new(engine), Arc::clone(&cache), config);

    tokio::spawn(async move {
        run_session_actor(state, cmd_rx).await;
    });

    SessionHandle::new(cmd_tx, cache)
}

/// Drain a run's events, returning the final one.
///
/// `on_event` sees every event, the final one included.
pub async fn drain_run(
    events: &mut mpsc::UnboundedReceiver<RunEvent>,
    mut on_event: impl FnMut(&RunEvent),
) -> Option<RunEvent> {
    while let Some(event) = events.recv().await {
        on_event(&event);
        if event.is_terminal() {
            return Some(event);
        }
    }
    None
}
