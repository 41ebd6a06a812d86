use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::models::User;

/// Live authentication status and the identity behind it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    pub is_authenticated: bool,
    pub user: Option<User>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user: User) -> Self {
        Self {
            is_authenticated: true,
            user: Some(user),
        }
    }

    /// Authenticated on the strength of a stored token while the user record
    /// is still being fetched. Transient, not an error.
    pub fn is_loading(&self) -> bool {
        self.is_authenticated && self.user.is_none()
    }
}

/// Generation stamp taken when an async operation is dispatched.
/// A completion carrying an old ticket lost the race and is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

type Observer = Arc<dyn Fn(&Session) + Send + Sync>;

/// A notification waiting to be handed to observers
struct Pending {
    observers: Vec<Observer>,
    session: Session,
}

struct Inner {
    session: Session,
    generation: u64,
    next_observer_id: u64,
    observers: Vec<(u64, Observer)>,
    /// Notifications in transition order, not yet delivered
    pending: VecDeque<Pending>,
    /// Set while some caller is draining `pending`
    delivering: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    watch_tx: watch::Sender<Session>,
}

/// The one authoritative session record.
///
/// Cloning is cheap and every clone refers to the same state, so a single
/// instance is created by the composition root and handed to each consumer.
/// Only the gateway transitions it; everyone else reads or subscribes.
///
/// Observer callbacks run on the task that caused the change, one
/// notification at a time and in order. An observer may subscribe (or cause
/// another change) from inside its callback; whatever that triggers is
/// delivered after the current notification finishes.
#[derive(Clone)]
pub struct SessionState {
    shared: Arc<Shared>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        let (watch_tx, _) = watch::channel(Session::anonymous());
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    session: Session::anonymous(),
                    generation: 0,
                    next_observer_id: 0,
                    observers: Vec::new(),
                    pending: VecDeque::new(),
                    delivering: false,
                }),
                watch_tx,
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current session
    pub fn current(&self) -> Session {
        self.inner().session.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner().session.is_authenticated
    }

    pub fn user(&self) -> Option<User> {
        self.inner().session.user.clone()
    }

    /// Register an observer. It is called right away with the current
    /// session, then with every later session in order, until the returned
    /// handle is dropped.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(observer);

        let id = {
            let mut inner = self.inner();
            let id = inner.next_observer_id;
            inner.next_observer_id += 1;
            inner.observers.push((id, Arc::clone(&observer)));
            let replay = Pending {
                observers: vec![observer],
                session: inner.session.clone(),
            };
            inner.pending.push_back(replay);
            id
        };
        self.deliver();

        Subscription {
            state: Arc::downgrade(&self.shared),
            id,
        }
    }

    /// Latest-value channel for async consumers
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.shared.watch_tx.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn observer_count(&self) -> usize {
        self.inner().observers.len()
    }

    /// Stamp for an operation about to be dispatched
    pub(crate) fn ticket(&self) -> Ticket {
        Ticket(self.inner().generation)
    }

    pub(crate) fn activate(&self, user: User) {
        self.transition(None, Session::signed_in(user));
    }

    pub(crate) fn reset(&self) {
        self.transition(None, Session::anonymous());
    }

    /// Authenticated with the user still unknown (startup with a stored token)
    pub(crate) fn assume_authenticated(&self) {
        self.transition(
            None,
            Session {
                is_authenticated: true,
                user: None,
            },
        );
    }

    /// `activate`, unless the session moved on since `ticket` was taken
    pub(crate) fn activate_if_current(&self, ticket: Ticket, user: User) -> bool {
        self.transition(Some(ticket), Session::signed_in(user))
    }

    /// `reset`, unless the session moved on since `ticket` was taken
    pub(crate) fn reset_if_current(&self, ticket: Ticket) -> bool {
        self.transition(Some(ticket), Session::anonymous())
    }

    fn transition(&self, expected: Option<Ticket>, next: Session) -> bool {
        {
            let mut inner = self.inner();
            if let Some(Ticket(generation)) = expected {
                if generation != inner.generation {
                    debug!(
                        ticket = generation,
                        current = inner.generation,
                        "Discarding stale session update"
                    );
                    return false;
                }
            }
            inner.generation += 1;
            inner.session = next.clone();
            debug!(
                generation = inner.generation,
                authenticated = next.is_authenticated,
                user_id = next.user.as_ref().map(|u| u.id),
                "Session updated"
            );
            self.shared.watch_tx.send_replace(next.clone());
            let observers = inner.observers.iter().map(|(_, o)| Arc::clone(o)).collect();
            inner.pending.push_back(Pending {
                observers,
                session: next,
            });
        }

        self.deliver();
        true
    }

    /// Run queued notifications unless another caller is already doing so;
    /// that caller picks up anything queued here before it stops.
    fn deliver(&self) {
        {
            let mut inner = self.inner();
            if inner.delivering {
                return;
            }
            inner.delivering = true;
        }
        let mut draining = Draining {
            shared: &self.shared,
            finished: false,
        };

        loop {
            let pending = {
                let mut inner = self.inner();
                match inner.pending.pop_front() {
                    Some(pending) => pending,
                    None => {
                        // Released under the same lock that saw the queue empty
                        inner.delivering = false;
                        draining.finished = true;
                        return;
                    }
                }
            };
            for observer in &pending.observers {
                observer(&pending.session);
            }
        }
    }
}

/// Releases the delivering flag if an observer panics mid-drain
struct Draining<'a> {
    shared: &'a Shared,
    finished: bool,
}

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let mut inner = self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.delivering = false;
        }
    }
}

/// Keeps an observer registered; dropping it unregisters
pub struct Subscription {
    state: std::sync::Weak<Shared>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.state.upgrade() {
            let mut inner = shared.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.observers.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_user(id: i64) -> User {
        User {
            id,
            full_name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            phone_number: "5551234".to_string(),
            date_of_birth: "1990-01-01".to_string(),
            role: "User".to_string(),
            is_active: true,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn recorder(state: &SessionState) -> (Arc<Mutex<Vec<Session>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = state.subscribe(move |s| sink.lock().unwrap().push(s.clone()));
        (seen, sub)
    }

    #[test]
    fn test_starts_anonymous() {
        let state = SessionState::new();
        assert_eq!(state.current(), Session::anonymous());
        assert!(!state.is_authenticated());
        assert_eq!(state.user(), None);
    }

    #[test]
    fn test_activate_and_reset() {
        let state = SessionState::new();
        state.activate(sample_user(1));
        assert!(state.is_authenticated());
        assert_eq!(state.user().map(|u| u.id), Some(1));

        state.reset();
        assert_eq!(state.current(), Session::anonymous());
    }

    #[test]
    fn test_observer_gets_current_then_every_update() {
        let state = SessionState::new();
        state.activate(sample_user(1));

        let (seen, _sub) = recorder(&state);
        state.reset();
        state.activate(sample_user(2));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].user.as_ref().map(|u| u.id), Some(1));
        assert_eq!(seen[1], Session::anonymous());
        assert_eq!(seen[2].user.as_ref().map(|u| u.id), Some(2));
    }

    #[test]
    fn test_dropping_subscription_unregisters() {
        let state = SessionState::new();
        let (seen, sub) = recorder(&state);
        assert_eq!(state.observer_count(), 1);

        drop(sub);
        assert_eq!(state.observer_count(), 0);
        state.activate(sample_user(1));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_observer_can_read_state() {
        let state = SessionState::new();
        let reader = state.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = state.subscribe(move |_| sink.lock().unwrap().push(reader.is_authenticated()));

        state.activate(sample_user(1));
        assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    }

    #[test]
    fn test_observer_can_subscribe_during_delivery() {
        let state = SessionState::new();
        let registrar = state.clone();
        let late_seen = Arc::new(Mutex::new(Vec::new()));
        let late_sub: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&late_seen);
        let slot = Arc::clone(&late_sub);
        let _sub = state.subscribe(move |session: &Session| {
            let mut slot = slot.lock().unwrap();
            if session.is_authenticated && slot.is_none() {
                let sink = Arc::clone(&sink);
                *slot = Some(registrar.subscribe(move |s| sink.lock().unwrap().push(s.clone())));
            }
        });

        state.activate(sample_user(1));
        state.reset();

        let seen = late_seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].user.as_ref().map(|u| u.id), Some(1));
        assert_eq!(seen[1], Session::anonymous());
        assert_eq!(state.observer_count(), 2);
    }

    #[test]
    fn test_subscribe_inside_observer_on_worker_thread_completes() {
        let state = SessionState::new();
        let registrar = state.clone();
        let nested: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));
        let keep = Arc::clone(&nested);
        let _sub = state.subscribe(move |session: &Session| {
            if session.is_authenticated {
                keep.lock().unwrap().push(registrar.subscribe(|_| {}));
            }
        });

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let worker = state.clone();
        std::thread::spawn(move || {
            worker.activate(sample_user(1));
            let _ = done_tx.send(());
        });

        assert!(done_rx.recv_timeout(std::time::Duration::from_secs(3)).is_ok());
        assert_eq!(nested.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_change_from_observer_is_delivered_after_current_one() {
        let state = SessionState::new();
        let (first_seen, _first) = recorder(&state);

        let bouncer = state.clone();
        let _sub = state.subscribe(move |session: &Session| {
            if session.user.as_ref().is_some_and(|u| u.id == 1) {
                bouncer.reset();
            }
        });
        let (last_seen, _last) = recorder(&state);

        state.activate(sample_user(1));

        let ids = |seen: &Arc<Mutex<Vec<Session>>>| -> Vec<Option<i64>> {
            seen.lock()
                .unwrap()
                .iter()
                .map(|s| s.user.as_ref().map(|u| u.id))
                .collect()
        };
        // Every observer sees the activation before the reset it triggered
        assert_eq!(ids(&first_seen), vec![None, Some(1), None]);
        assert_eq!(ids(&last_seen), vec![None, Some(1), None]);
        assert_eq!(state.current(), Session::anonymous());
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let state = SessionState::new();
        state.assume_authenticated();
        let ticket = state.ticket();

        state.reset();
        assert!(!state.activate_if_current(ticket, sample_user(1)));
        assert_eq!(state.current(), Session::anonymous());
    }

    #[test]
    fn test_current_ticket_applies() {
        let state = SessionState::new();
        state.assume_authenticated();
        assert!(state.current().is_loading());

        let ticket = state.ticket();
        assert!(state.activate_if_current(ticket, sample_user(3)));
        assert!(!state.current().is_loading());
        // The ticket is spent once the generation moves
        assert!(!state.reset_if_current(ticket));
        assert!(state.is_authenticated());
    }

    #[tokio::test]
    async fn test_watch_replays_latest() {
        let state = SessionState::new();
        state.activate(sample_user(5));

        let mut rx = state.watch();
        assert_eq!(rx.borrow().user.as_ref().map(|u| u.id), Some(5));

        state.reset();
        rx.changed().await.expect("session sender dropped");
        assert!(!rx.borrow().is_authenticated);
    }
}
