//! Per-request credential context and runtime environment detection.
//!
//! When the LB handler receives `Authorization: Bearer <k>`, the key is
//! scoped to the request's task so any outbound stub call the handler makes
//! carries the caller's identity instead of the container's. Storage is
//! task-local: concurrent requests never observe each other's keys.

use std::cell::RefCell;
use std::future::Future;

use flash_domain::env;

tokio::task_local! {
    static REQUEST_API_KEY: RefCell<Option<String>>;
}

/// Run `fut` inside a fresh credential scope seeded with `key`.
///
/// The scope ends (and the key vanishes) when the future completes — on
/// success, error, or cancellation alike. This is the only way middleware
/// should install a key.
pub async fn scope<F, T>(key: Option<String>, fut: F) -> T
where
    F: Future<Output = T>,
{
    REQUEST_API_KEY.scope(RefCell::new(key), fut).await
}

/// Opaque token remembering the value displaced by [`set`].
#[derive(Debug)]
pub struct ContextToken(Option<String>);

/// Install a key in the current scope, returning a token that restores the
/// previous value via [`clear`]. Outside a scope this is a no-op.
pub fn set(key: impl Into<String>) -> ContextToken {
    let key = key.into();
    let previous = REQUEST_API_KEY
        .try_with(|cell| cell.borrow_mut().replace(key))
        .ok()
        .flatten();
    ContextToken(previous)
}

/// The key for the current request's task, if any.
pub fn get() -> Option<String> {
    REQUEST_API_KEY
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}

/// Restore the value the paired [`set`] displaced. Passing no token clears
/// the slot entirely.
pub fn clear(token: Option<ContextToken>) {
    let restored = token.and_then(|t| t.0);
    let _ = REQUEST_API_KEY.try_with(|cell| *cell.borrow_mut() = restored);
}

// ── Runtime environment ────────────────────────────────────────────

/// True when this process runs inside a deployed platform container:
/// `RUNPOD_ENDPOINT_ID` or `RUNPOD_POD_ID` present, and not overridden by
/// the explicit local-dev flag `FLASH_IS_LIVE_PROVISIONING`.
pub fn is_deployed_container() -> bool {
    if env::flag(env::FLASH_IS_LIVE_PROVISIONING) {
        return false;
    }
    env::var_nonblank(env::RUNPOD_ENDPOINT_ID).is_some()
        || env::var_nonblank(env::RUNPOD_POD_ID).is_some()
}

pub fn is_local_development() -> bool {
    !is_deployed_container()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_by_default() {
        scope(None, async {
            assert_eq!(get(), None);
        })
        .await;
    }

    #[tokio::test]
    async fn scope_seeds_and_vanishes() {
        scope(Some("key-a".into()), async {
            assert_eq!(get().as_deref(), Some("key-a"));
        })
        .await;
        // Outside any scope there is nothing to read.
        assert_eq!(get(), None);
    }

    #[tokio::test]
    async fn set_and_clear_restore_outer_value() {
        scope(Some("outer".into()), async {
            let token = set("inner");
            assert_eq!(get().as_deref(), Some("inner"));
            clear(Some(token));
            assert_eq!(get().as_deref(), Some("outer"));
        })
        .await;
    }

    #[tokio::test]
    async fn clear_without_token_empties_slot() {
        scope(Some("outer".into()), async {
            clear(None);
            assert_eq!(get(), None);
        })
        .await;
    }

    #[tokio::test]
    async fn concurrent_tasks_are_isolated() {
        let a = tokio::spawn(scope(Some("task-a".into()), async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            get()
        }));
        let b = tokio::spawn(scope(Some("task-b".into()), async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            get()
        }));
        assert_eq!(a.await.unwrap().as_deref(), Some("task-a"));
        assert_eq!(b.await.unwrap().as_deref(), Some("task-b"));
    }
}
