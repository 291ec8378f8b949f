//! # EWM Runtime
//!
//! Runtime pieces that sit between the pure reducers and the outside world.
//!
//! ## Core Components
//!
//! - **`dispatch`**: Runs one action through a reducer, executes the returned
//!   effects and feeds every produced action back until nothing is left
//! - **`KeyedLocks`**: Per-key async mutual exclusion, used to serialize every
//!   unit of work that touches the same aggregate
//!
//! ## Example
//!
//! ```ignore
//! use ewm_runtime::{dispatch, KeyedLocks};
//!
//! let locks = KeyedLocks::new();
//! let _guard = locks.acquire(event_id).await;
//!
//! let mut state = load_state(event_id).await?;
//! dispatch(&reducer, &mut state, Action::Publish { event_id }, &env).await;
//! ```

use ewm_core::{effect::Effect, reducer::Reducer};
use futures::future::{join_all, BoxFuture};
use std::collections::VecDeque;

/// Per-key async locks
pub mod locks;

pub use locks::KeyedLocks;

/// Upper bound on actions processed by a single `dispatch` call.
///
/// Reducers in this workspace produce at most one feedback action per
/// command, so hitting the bound means a reducer is looping on itself.
pub const MAX_ACTIONS_PER_DISPATCH: usize = 64;

/// Run an action through a reducer until the feedback loop settles.
///
/// The initial action is reduced, its effects are executed in order and any
/// action produced by an effect is queued and reduced in turn. State is only
/// ever touched through the reducer, so the caller observes the final state
/// (including `last_error`-style bookkeeping) once this returns.
///
/// Returns the number of actions that were reduced.
pub async fn dispatch<R>(
    reducer: &R,
    state: &mut R::State,
    action: R::Action,
    env: &R::Environment,
) -> usize
where
    R: Reducer + Sync,
    R::State: Send,
    R::Action: Send + 'static,
    R::Environment: Sync,
{
    let mut queue = VecDeque::from([action]);
    let mut processed = 0;

    while let Some(action) = queue.pop_front() {
        if processed == MAX_ACTIONS_PER_DISPATCH {
            tracing::error!(
                processed,
                dropped = queue.len() + 1,
                "Feedback loop did not settle, dropping remaining actions"
            );
            break;
        }
        processed += 1;

        let effects = reducer.reduce(state, action, env);
        for effect in effects {
            queue.extend(execute(effect).await);
        }
    }

    tracing::trace!(processed, "Dispatch settled");
    processed
}

/// Execute one effect description and collect the actions it produced.
fn execute<A>(effect: Effect<A>) -> BoxFuture<'static, Vec<A>>
where
    A: Send + 'static,
{
    Box::pin(async move {
        match effect {
            Effect::None => Vec::new(),
            Effect::Future(future) => future.await.into_iter().collect(),
            Effect::Sequential(effects) => {
                let mut produced = Vec::new();
                for effect in effects {
                    produced.extend(execute(effect).await);
                }
                produced
            },
            Effect::Parallel(effects) => join_all(effects.into_iter().map(execute))
                .await
                .into_iter()
                .flatten()
                .collect(),
        }
    })
}
