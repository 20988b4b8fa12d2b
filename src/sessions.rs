use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{classify::FailureCategory, error::StoreError};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Turn {
    pub prompt: String,
    pub aspect_ratio: String,
    pub images: Vec<String>, // data URLs
    #[serde(default)]
    pub error_reason: Option<FailureCategory>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self { id, turns: Vec::new(), created_at: now, updated_at: now }
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

/// In-memory sessions mirrored to `{dir}/{id}.json`.
pub struct SessionStore {
    dir: PathBuf,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), sessions: RwLock::default() }
    }

    /// Reads every session file in `dir`; unreadable files are skipped.
    pub fn load_all(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(dir);
        if !store.dir.exists() {
            return Ok(store);
        }
        let mut loaded = HashMap::new();
        for entry in fs::read_dir(&store.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read(&path).map_err(StoreError::from).and_then(|b| Ok(serde_json::from_slice::<Session>(&b)?)) {
                Ok(session) => {
                    loaded.insert(session.id, session);
                }
                Err(e) => warn!("⚠️ Skipping unreadable session {}: {}", path.display(), e),
            }
        }
        info!("📚 Loaded {} sessions from {}", loaded.len(), store.dir.display());
        *store.sessions.write() = loaded;
        Ok(store)
    }

    pub fn create(&self) -> Result<Session, StoreError> {
        let session = Session::new(Uuid::new_v4());
        self.sessions.write().insert(session.id, session.clone());
        self.write_file(&session)?;
        Ok(session)
    }

    pub fn get(&self, id: &Uuid) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    /// Appends a turn, creating the session if the id is new.
    pub fn append_turn(&self, id: Uuid, turn: Turn) -> Result<Session, StoreError> {
        let snapshot = {
            let mut guard = self.sessions.write();
            let session = guard.entry(id).or_insert_with(|| Session::new(id));
            session.turns.push(turn);
            session.updated_at = Utc::now();
            session.clone()
        };
        self.write_file(&snapshot)?;
        Ok(snapshot)
    }

    fn write_file(&self, session: &Session) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(format!("{}.json", session.id)), serde_json::to_vec_pretty(session)?)?;
        Ok(())
    }
}
