//! # Resources
//!
//! A [`Resource`] wraps one fetch and exposes its `{data, loading, error}`
//! triple through a `watch` channel.
//!
//! Fetches are not de-duplicated or fenced. When two overlap, whichever
//! response lands last is what `data` ends up holding, and `loading` drops
//! to false as each one settles.

use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::error::ApiError;
use crate::client::session::{SessionContext, SessionState};
use crate::types::{AttendanceHistory, ClassList, Dashboard, HistoryQuery, Role};

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

type Fetch<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

struct Inner<T> {
    state: watch::Sender<ResourceState<T>>,
    fetch: Fetch<T>,
}

pub struct Resource<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Resource<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F>(fetch: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync + 'static,
    {
        let (state, _) = watch::channel(ResourceState::default());
        Self {
            inner: Arc::new(Inner {
                state,
                fetch: Box::new(fetch),
            }),
        }
    }

    pub fn snapshot(&self) -> ResourceState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.inner.state.borrow().data.clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.inner.state.subscribe()
    }

    /// Drops data and error, e.g. after sign-out.
    pub fn reset(&self) {
        self.inner.state.send_replace(ResourceState::default());
    }

    /// Starts a fetch.
    ///
    /// `loading` is already true when this returns; the returned future runs
    /// the request and settles the state.
    pub fn refetch(&self) -> BoxFuture<'static, ()> {
        Inner::start(&self.inner)
    }

    /// Re-fetches on every session change while signed in and resets on
    /// sign-out. Fetches once immediately when already signed in.
    ///
    /// The task ends when the resource or the session is dropped.
    pub fn bind_to_session(&self, session: &SessionContext) -> JoinHandle<()> {
        let mut changes = session.subscribe();
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut signed_in = changes.borrow_and_update().is_authenticated();
            loop {
                if signed_in {
                    let Some(inner) = weak.upgrade() else { break };
                    Inner::start(&inner).await;
                }
                if changes.changed().await.is_err() {
                    break;
                }
                let Some(inner) = weak.upgrade() else { break };
                signed_in = changes.borrow_and_update().is_authenticated();
                if !signed_in {
                    inner.state.send_replace(ResourceState::default());
                }
            }
        })
    }
}

impl<T> Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn start(this: &Arc<Self>) -> BoxFuture<'static, ()> {
        this.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
        let request = (this.fetch)();
        let inner = Arc::clone(this);
        async move {
            let outcome = request.await;
            inner.state.send_modify(|s| {
                match outcome {
                    Ok(value) => s.data = Some(value),
                    Err(e) => {
                        tracing::debug!("Resource fetch failed: {}", e);
                        s.error = Some(e.to_string());
                    }
                }
                s.loading = false;
            });
        }
        .boxed()
    }
}

fn signed_in_user(state: &SessionState) -> Result<(Role, i64), ApiError> {
    state
        .user()
        .map(|u| (u.role, u.id))
        .ok_or(ApiError::SignedOut)
}

/// Dashboard for the signed-in user's role.
pub fn dashboard_resource(session: &Arc<SessionContext>) -> Resource<Dashboard> {
    let session = Arc::clone(session);
    Resource::new(move || {
        let session = Arc::clone(&session);
        async move {
            let (role, id) = signed_in_user(&session.state())?;
            session.api().dashboard(role, id).await
        }
        .boxed()
    })
}

/// The signed-in user's attendance history.
pub fn attendance_resource(
    session: &Arc<SessionContext>,
    query: HistoryQuery,
) -> Resource<AttendanceHistory> {
    let session = Arc::clone(session);
    Resource::new(move || {
        let session = Arc::clone(&session);
        let query = query.clone();
        async move {
            let (_, id) = signed_in_user(&session.state())?;
            session.api().student_attendance(id, &query).await
        }
        .boxed()
    })
}

/// Classes currently open for attendance.
pub fn classes_resource(session: &Arc<SessionContext>) -> Resource<ClassList> {
    let session = Arc::clone(session);
    Resource::new(move || {
        let api = Arc::clone(session.api());
        async move { api.active_classes().await }.boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn loading_is_set_before_the_future_runs() {
        let resource = Resource::new(|| async { Ok::<_, ApiError>(5_u32) }.boxed());
        let pending = resource.refetch();
        assert!(resource.loading());
        pending.await;
        assert!(!resource.loading());
        assert_eq!(resource.data(), Some(5));
    }

    #[tokio::test]
    async fn failure_clears_loading_and_keeps_message() {
        let resource: Resource<u32> = Resource::new(|| {
            async {
                Err(ApiError::HttpStatus {
                    status: reqwest::StatusCode::BAD_REQUEST,
                    message: "QR_CODE_EXPIRED".into(),
                    code: None,
                })
            }
            .boxed()
        });
        resource.refetch().await;
        let state = resource.snapshot();
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("QR_CODE_EXPIRED"));
        assert_eq!(state.data, None);
    }

    #[tokio::test]
    async fn last_response_to_arrive_wins() {
        let (first_tx, first_rx) = oneshot::channel::<u32>();
        let (second_tx, second_rx) = oneshot::channel::<u32>();
        let receivers = parking_lot::Mutex::new(vec![second_rx, first_rx]);
        let resource = Resource::new(move || {
            let rx = receivers.lock().pop();
            async move {
                match rx {
                    Some(rx) => rx.await.map_err(|e| ApiError::Decode(e.to_string())),
                    None => Err(ApiError::SignedOut),
                }
            }
            .boxed()
        });

        let first = tokio::spawn(resource.refetch());
        let second = tokio::spawn(resource.refetch());
        second_tx.send(2).unwrap();
        second.await.unwrap();
        first_tx.send(1).unwrap();
        first.await.unwrap();

        assert!(!resource.loading());
        assert_eq!(resource.data(), Some(1));
    }
}
