//! Session Registry
//!
//! Shared table of live sessions keyed by group and identifier, plus the
//! three delivery primitives (unicast, group-cast, broadcast).
//!
//! One readers-writer lock guards the whole table: admission and removal
//! take the write half, lookups, fan-out and identifier allocation take the
//! read half. [`Registry::join`] picks an identifier and admits the session
//! under a single write guard. Removal happens only on the teardown coordinator, a single
//! background task fed by [`Registry::request_teardown`].

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::error::{HubError, HubResult};
use super::outbound::OutboundReceiver;
use super::payload::{Delivery, Payload};
use super::session::{Session, SessionTasks};
use super::transform::Transform;
use crate::transport::{FrameReader, FrameWriter};

/// Runtime settings for a registry
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Label used in logs
    pub name: String,
    /// Most messages folded into one outbound frame (0 = no cap)
    pub max_coalesce: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            name: "hub".to_string(),
            max_coalesce: 0,
        }
    }
}

impl HubConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Group → identifier → session
#[derive(Default)]
struct Table {
    groups: HashMap<String, HashMap<String, Arc<Session>>>,
}

impl Table {
    fn is_taken(&self, group: &str, id: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains_key(id))
    }

    fn unused_identifier(&self, group: &str) -> String {
        let mut id = Uuid::new_v4().to_string();
        while self.is_taken(group, &id) {
            id = Uuid::new_v4().to_string();
        }
        id
    }

    fn insert(&mut self, session: &Arc<Session>) -> HubResult<()> {
        let members = self.groups.entry(session.group().to_string()).or_default();
        if members.contains_key(session.id()) {
            return Err(HubError::DuplicateIdentifier {
                group: session.group().to_string(),
                id: session.id().to_string(),
            });
        }
        members.insert(session.id().to_string(), Arc::clone(session));
        Ok(())
    }

    /// Remove `session` if it is still the entry under its key
    fn remove(&mut self, session: &Arc<Session>) -> bool {
        let Some(members) = self.groups.get_mut(session.group()) else {
            return false;
        };
        let is_same = members
            .get(session.id())
            .is_some_and(|current| Arc::ptr_eq(current, session));
        if !is_same {
            return false;
        }

        members.remove(session.id());
        if members.is_empty() {
            self.groups.remove(session.group());
        }
        true
    }
}

/// A session admitted through [`Registry::join`], with its running loops
pub struct SessionHandle {
    pub session: Arc<Session>,
    pub tasks: SessionTasks,
}

/// Shared session table and router
pub struct Registry {
    config: HubConfig,
    table: Arc<RwLock<Table>>,
    teardown_tx: mpsc::UnboundedSender<Arc<Session>>,
}

impl Registry {
    /// Create an empty registry and start its teardown coordinator
    ///
    /// Must be called from within a tokio runtime.
    pub fn create(name: impl Into<String>) -> Arc<Registry> {
        Self::with_config(HubConfig::named(name))
    }

    pub fn with_config(config: HubConfig) -> Arc<Registry> {
        let table = Arc::new(RwLock::new(Table::default()));
        let (teardown_tx, teardown_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_teardown(
            config.name.clone(),
            Arc::clone(&table),
            teardown_rx,
        ));

        tracing::info!(hub = %config.name, "Hub created");

        Arc::new(Registry {
            config,
            table,
            teardown_tx,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Pick an identifier not held by any session in `group`
    ///
    /// Nothing is recorded: the identifier is only claimed by a later
    /// [`admit`](Self::admit). Two callers racing between allocation and
    /// admission can in principle receive the same value, in which case the
    /// second `admit` fails with [`HubError::DuplicateIdentifier`].
    /// [`join`](Self::join) has no such window.
    pub async fn allocate_identifier(&self, group: &str) -> String {
        self.table.read().await.unused_identifier(group)
    }

    fn ensure_open(&self) -> HubResult<()> {
        if self.teardown_tx.is_closed() {
            return Err(HubError::RegistryClosed(self.config.name.clone()));
        }
        Ok(())
    }

    /// Insert a session under its group and identifier
    ///
    /// Call before starting the session's loops. Fails for an empty group or
    /// identifier, or one already held by another live session.
    pub async fn admit(&self, session: &Arc<Session>) -> HubResult<()> {
        if session.group().is_empty() {
            return Err(HubError::InvalidGroup);
        }
        if session.id().is_empty() {
            return Err(HubError::InvalidIdentifier);
        }
        self.ensure_open()?;

        self.table.write().await.insert(session)?;
        self.log_admitted(session);
        Ok(())
    }

    /// Choose a fresh identifier and admit a new session under one write guard
    async fn allocate_and_admit(
        &self,
        group: &str,
        subprotocol: Option<String>,
        transform: Arc<dyn Transform>,
    ) -> HubResult<(Arc<Session>, OutboundReceiver)> {
        if group.is_empty() {
            return Err(HubError::InvalidGroup);
        }
        self.ensure_open()?;

        let mut table = self.table.write().await;
        let id = table.unused_identifier(group);
        let (session, outbound) = Session::new(group, id, subprotocol, transform);
        table.insert(&session)?;
        drop(table);

        self.log_admitted(&session);
        Ok((session, outbound))
    }

    fn log_admitted(&self, session: &Session) {
        tracing::debug!(
            hub = %self.config.name,
            group = %session.group(),
            session_id = %session.id(),
            "Session admitted"
        );
    }

    /// Allocate, admit and start a session over `reader`/`writer`
    pub async fn join<R, W>(
        self: &Arc<Self>,
        group: &str,
        subprotocol: Option<String>,
        transform: Arc<dyn Transform>,
        reader: R,
        writer: W,
    ) -> HubResult<SessionHandle>
    where
        R: FrameReader,
        W: FrameWriter,
    {
        let (session, outbound) = self.allocate_and_admit(group, subprotocol, transform).await?;
        let tasks = session.spawn(Arc::clone(self), outbound, reader, writer);
        Ok(SessionHandle { session, tasks })
    }

    /// Queue `message` for one session; 0 or 1 deliveries
    pub async fn unicast(&self, group: &str, id: &str, message: impl Into<Payload>) -> usize {
        let table = self.table.read().await;
        table
            .groups
            .get(group)
            .and_then(|members| members.get(id))
            .map_or(0, |session| usize::from(session.deliver(message.into())))
    }

    /// Queue `message` for every session in `group`
    pub async fn group_cast(&self, group: &str, message: impl Into<Payload>) -> usize {
        let message = message.into();
        let table = self.table.read().await;
        let Some(members) = table.groups.get(group) else {
            return 0;
        };
        members
            .values()
            .filter(|session| session.deliver(Arc::clone(&message)))
            .count()
    }

    /// Queue `message` for every session in every group
    pub async fn broadcast(&self, message: impl Into<Payload>) -> usize {
        let message = message.into();
        let table = self.table.read().await;
        table
            .groups
            .values()
            .flat_map(|members| members.values())
            .filter(|session| session.deliver(Arc::clone(&message)))
            .count()
    }

    /// Route one transform-produced delivery
    pub async fn deliver(&self, delivery: Delivery) -> usize {
        match delivery {
            Delivery::Unicast { group, id, message } => self.unicast(&group, &id, message).await,
            Delivery::GroupCast { group, message } => self.group_cast(&group, message).await,
            Delivery::Broadcast { message } => self.broadcast(message).await,
        }
    }

    /// Ask the coordinator to remove `session`
    ///
    /// Never blocks. Safe to call more than once; later requests for a
    /// session already removed are ignored by the coordinator.
    pub fn request_teardown(&self, session: &Arc<Session>) {
        if session.begin_teardown() {
            tracing::debug!(
                hub = %self.config.name,
                session_id = %session.id(),
                "Teardown requested"
            );
        }
        if self.teardown_tx.send(Arc::clone(session)).is_err() {
            // Coordinator gone: nothing left to remove from
            session.close_outbound();
        }
    }

    /// Tear down a registered session from outside its loops
    pub async fn disconnect(&self, group: &str, id: &str) -> bool {
        match self.get(group, id).await {
            Some(session) => {
                self.request_teardown(&session);
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, group: &str, id: &str) -> Option<Arc<Session>> {
        let table = self.table.read().await;
        table.groups.get(group)?.get(id).cloned()
    }

    pub async fn contains(&self, group: &str, id: &str) -> bool {
        self.get(group, id).await.is_some()
    }

    /// Number of registered sessions across all groups
    pub async fn session_count(&self) -> usize {
        let table = self.table.read().await;
        table.groups.values().map(HashMap::len).sum()
    }

    pub async fn group_count(&self) -> usize {
        self.table.read().await.groups.len()
    }

    /// Identifiers currently registered in `group`
    pub async fn group_members(&self, group: &str) -> Vec<String> {
        let table = self.table.read().await;
        table
            .groups
            .get(group)
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Teardown coordinator: the only task that deletes table entries
async fn run_teardown(
    hub: String,
    table: Arc<RwLock<Table>>,
    mut requests: mpsc::UnboundedReceiver<Arc<Session>>,
) {
    while let Some(session) = requests.recv().await {
        session.close_outbound();

        let mut guard = table.write().await;
        let removed = guard.remove(&session);
        if removed {
            session.mark_closed();
        }
        drop(guard);

        if removed {
            tracing::info!(
                hub = %hub,
                group = %session.group(),
                session_id = %session.id(),
                "Session unregistered"
            );
        } else {
            tracing::debug!(
                hub = %hub,
                session_id = %session.id(),
                "Teardown ignored, session not registered"
            );
        }
    }

    tracing::debug!(hub = %hub, "Teardown coordinator stopped");
}
