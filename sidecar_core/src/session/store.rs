// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{collections::HashMap, sync::Arc, time::SystemTime};

use log::debug;
use parking_lot::RwLock;
use thegraph_core::alloy::primitives::Address;

use super::{Session, SessionId};
use crate::{Error, Result};

/// Concurrent registry of sessions.
///
/// The map lock is only held for the map operation itself. Callers receive an
/// `Arc<Session>` and mutate it through the session's own lock, so lookups never wait
/// on a session being updated.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new active session under a freshly generated id.
    pub fn create(&self, payer: Address, receiver: Address, data_service: Address) -> Arc<Session> {
        let mut sessions = self.sessions.write();
        let mut id = SessionId::generate();
        while sessions.contains_key(&id) {
            id = SessionId::generate();
        }
        let session = Arc::new(Session::new(id.clone(), payer, receiver, data_service));
        sessions.insert(id, session.clone());
        debug!("Created session {} for payer {payer}", session.id());
        session
    }

    pub fn get(&self, session_id: &SessionId) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound {
                session_id: session_id.clone(),
            })
    }

    /// Removes a session. Removing an unknown id is a no-op.
    pub fn delete(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.write().remove(session_id)
    }

    /// Sessions that are active at call time.
    pub fn active(&self) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .values()
            .filter(|session| session.is_active())
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Evicts ended sessions whose end time is before `cutoff`, returning how many were removed.
    pub fn delete_ended_before(&self, cutoff: SystemTime) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.ended_at().is_some_and(|ended| ended < cutoff));
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::Arc,
        thread,
        time::{Duration, SystemTime},
    };

    use rstest::*;
    use thegraph_core::alloy::primitives::Address;

    use super::SessionStore;
    use crate::{
        session::{EndReason, SessionId},
        Error,
    };

    #[fixture]
    fn store() -> SessionStore {
        SessionStore::new()
    }

    fn create(store: &SessionStore) -> Arc<super::Session> {
        store.create(
            Address::from([0x01u8; 20]),
            Address::from([0x03u8; 20]),
            Address::from([0x02u8; 20]),
        )
    }

    #[rstest]
    fn created_session_can_be_found(store: SessionStore) {
        let session = create(&store);
        let found = store.get(session.id()).unwrap();

        assert!(Arc::ptr_eq(&session, &found));
        assert_eq!(store.count(), 1);
    }

    #[rstest]
    fn deleted_session_is_not_found(store: SessionStore) {
        let session = create(&store);
        let id = session.id().clone();

        assert!(store.delete(&id).is_some());
        assert!(store.delete(&id).is_none());
        assert!(matches!(
            store.get(&id),
            Err(Error::SessionNotFound { session_id }) if session_id == id
        ));
        assert_eq!(store.count(), 0);
    }

    #[rstest]
    fn unknown_id_is_not_found(store: SessionStore) {
        assert!(store.get(&SessionId::from("missing")).is_err());
    }

    #[rstest]
    fn active_excludes_ended_sessions(store: SessionStore) {
        let first = create(&store);
        let second = create(&store);
        second.end(EndReason::Completed);

        let active = store.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id(), first.id());
        assert_eq!(store.count(), 2);
    }

    #[rstest]
    fn ids_are_unique_under_concurrency(store: SessionStore) {
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    (0..100)
                        .map(|_| create(&store).id().clone())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: HashSet<_> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        assert_eq!(ids.len(), 800);
        assert_eq!(store.count(), 800);
    }

    #[rstest]
    fn evicts_only_sessions_ended_before_cutoff(store: SessionStore) {
        let running = create(&store);
        let ended = create(&store);
        ended.end(EndReason::Completed);

        assert_eq!(
            store.delete_ended_before(SystemTime::now() - Duration::from_secs(60)),
            0
        );
        assert_eq!(
            store.delete_ended_before(SystemTime::now() + Duration::from_secs(1)),
            1
        );
        assert!(store.get(running.id()).is_ok());
        assert!(store.get(ended.id()).is_err());
    }
}
