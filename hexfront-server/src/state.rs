//! Server state management
//!
//! One authoritative session plus the replication log observers poll.

use crate::ServerConfig;
use anyhow::Context;
use hexfront_core::{
    BuildingCatalog, GridConfig, GridResult, MapData, NullLifecycle, Replication, Role, Session,
    TileProfile,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Events kept for late pollers
pub const EVENT_LOG_CAPACITY: usize = 4096;

/// A replication event with its position in the feed
#[derive(Clone, Debug, Serialize)]
pub struct SequencedEvent {
    pub seq: u64,
    pub event: Replication,
}

/// Bounded, ordered replication feed. Sequence numbers start at 1.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Vec<SequencedEvent>,
    last_seq: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, events: Vec<Replication>) {
        for event in events {
            self.last_seq += 1;
            self.entries.push(SequencedEvent {
                seq: self.last_seq,
                event,
            });
        }

        if self.entries.len() > EVENT_LOG_CAPACITY {
            let excess = self.entries.len() - EVENT_LOG_CAPACITY;
            self.entries.drain(..excess);
        }
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Oldest sequence still held (0 when empty)
    pub fn first_seq(&self) -> u64 {
        self.entries.first().map_or(0, |e| e.seq)
    }

    /// Events after `seq`, in order
    pub fn since(&self, seq: u64) -> Vec<SequencedEvent> {
        let start = self.entries.partition_point(|e| e.seq <= seq);
        self.entries[start..].to_vec()
    }
}

/// Server-wide shared state
pub struct ServerState {
    pub session: RwLock<Session<NullLifecycle>>,
    pub events: RwLock<EventLog>,
    pub map_path: Option<PathBuf>,
}

impl ServerState {
    /// Standard profile and catalog on a blank default-size grid
    pub fn new() -> Self {
        Self::with_session(Self::blank_session(GridConfig::default()), None)
    }

    /// Seeded variant of `new`, for reproducible paths
    pub fn with_seed(seed: u64) -> Self {
        Self::with_session(
            Self::blank_session(GridConfig::default().with_seed(seed)),
            None,
        )
    }

    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let profile = match &config.profile_path {
            Some(path) => TileProfile::load(path)
                .with_context(|| format!("loading tile profile {}", path.display()))?,
            None => TileProfile::standard(),
        };
        let catalog = match &config.catalog_path {
            Some(path) => BuildingCatalog::load(path)
                .with_context(|| format!("loading building catalog {}", path.display()))?,
            None => BuildingCatalog::standard(),
        };

        let mut session = Session::new(
            Role::Server,
            config.grid.clone(),
            profile,
            catalog,
            NullLifecycle::default(),
        );

        match &config.map_path {
            Some(path) if path.exists() => {
                let map = MapData::load(path)
                    .with_context(|| format!("loading map {}", path.display()))?;
                session.load_map(&map)?;
            }
            Some(path) => {
                tracing::warn!("Map {} not found, starting blank", path.display());
                session.generate(config.grid.width, config.grid.height)?;
            }
            None => session.generate(config.grid.width, config.grid.height)?,
        }

        Ok(Self::with_session(session, config.map_path.clone()))
    }

    fn blank_session(config: GridConfig) -> Session<NullLifecycle> {
        let (width, height) = (config.width, config.height);
        let mut session = Session::new(
            Role::Server,
            config,
            TileProfile::standard(),
            BuildingCatalog::standard(),
            NullLifecycle::default(),
        );
        if let Err(e) = session.generate(width, height) {
            tracing::error!("Blank grid failed: {}", e);
        }
        session
    }

    fn with_session(mut session: Session<NullLifecycle>, map_path: Option<PathBuf>) -> Self {
        let mut log = EventLog::new();
        log.append(session.take_replication());
        Self {
            session: RwLock::new(session),
            events: RwLock::new(log),
            map_path,
        }
    }

    /// Run a mutation and publish what it replicated. The session lock is
    /// held until the events are logged so the feed keeps mutation order.
    pub async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Session<NullLifecycle>) -> GridResult<T>,
    ) -> GridResult<T> {
        let mut session = self.session.write().await;
        let result = f(&mut session);
        let events = session.take_replication();
        if !events.is_empty() {
            self.events.write().await.append(events);
        }
        result
    }

    /// One production step plus binding timeouts
    pub async fn tick(&self, dt: Duration) {
        let mut session = self.session.write().await;
        session.tick(dt.as_secs_f32());
        for error in session.expire_detached(Instant::now()) {
            tracing::warn!("{}", error);
        }
        let events = session.take_replication();
        if !events.is_empty() {
            self.events.write().await.append(events);
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}
