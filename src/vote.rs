//! Vote tally handler for the escape-room colour vote.
//!
//! Players drop vote records into a per-room queue. Each new record is
//! validated, rate-limited per session and folded into the room's tally in a
//! single optimistic transaction. The queue record is always deleted
//! afterwards, whatever happened: malformed or racy input is dropped, never
//! retried.

use crate::util::{lock_or_recover, normalize_hex};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Minimum time between two accepted votes from the same session.
pub const COOLDOWN_MS: i64 = 5000;

/// Compare-and-swap attempts before the transaction gives up.
pub const MAX_TRANSACTION_ATTEMPTS: usize = 25;

pub const NO_LEADER: &str = "#000000";

/// Per-room tally. `counts` is keyed by `RRGGBB` without the `#`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    #[serde(default)]
    pub counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "default_leader")]
    pub leader: String,
    /// When the leader last changed, in ms since the epoch.
    #[serde(default)]
    pub ts: i64,
}

fn default_leader() -> String {
    NO_LEADER.to_string()
}

impl Default for Tally {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
            total: 0,
            leader: default_leader(),
            ts: 0,
        }
    }
}

/// Folds one vote for `color` (`RRGGBB`) into `tally`.
///
/// The leader only changes when some colour strictly beats the current
/// leader's count; ties keep the previous leader. `ts` moves only when the
/// leader does.
pub fn apply_vote(tally: Option<Tally>, color: &str, now_ms: i64) -> Tally {
    let mut tally = tally.unwrap_or_default();
    *tally.counts.entry(color.to_string()).or_insert(0) += 1;
    tally.total += 1;

    let current = tally.leader.trim_start_matches('#').to_string();
    let mut best = current.clone();
    let mut best_count = tally.counts.get(&current).copied();
    for (key, &count) in &tally.counts {
        if key.is_empty() {
            continue;
        }
        if best_count.map_or(true, |c| count > c) {
            best = key.clone();
            best_count = Some(count);
        }
    }

    let leader = format!("#{}", best);
    if leader != tally.leader {
        debug!("Leader changes {} -> {}", tally.leader, leader);
        tally.leader = leader;
        tally.ts = now_ms;
    }
    tally
}

/// A vote as submitted. Fields that are missing or not strings are coerced to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    pub color: String,
    pub session: String,
    pub code: String,
}

impl Ballot {
    /// Validates a raw queue record. `None` means the record is malformed.
    ///
    /// Falsy values (`null`, `false`, `0`, `""`) count as missing.
    pub fn from_record(record: &Value) -> Option<Self> {
        let field = |name: &str| match record.get(name) {
            None | Some(Value::Null) | Some(Value::Bool(false)) => String::new(),
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        let color = normalize_hex(&field("hex"))?;
        let session = field("session");
        let code = field("code");
        if session.is_empty() || code.is_empty() {
            return None;
        }
        Some(Self {
            color,
            session,
            code,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Malformed,
    WrongRoomCode,
    Cooldown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Accepted(Tally),
    Rejected(RejectReason),
    /// The store failed part-way. The queue record was still deleted.
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum VoteError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Tally transaction gave up after {0} attempts")]
    Contention(usize),
}

/// Storage the handler works against. Tally reads carry a version for
/// optimistic concurrency.
pub trait VoteStore {
    fn room_code(&self, room: &str) -> Result<Option<String>, VoteError>;
    fn last_vote_ms(&self, room: &str, session: &str) -> Result<Option<i64>, VoteError>;
    fn set_last_vote_ms(&self, room: &str, session: &str, ts: i64) -> Result<(), VoteError>;
    fn read_tally(&self, room: &str) -> Result<(Option<Tally>, u64), VoteError>;
    /// Writes `tally` only if the stored version is still `expected`.
    fn swap_tally(&self, room: &str, expected: u64, tally: Tally) -> Result<bool, VoteError>;
    fn remove_queued(&self, room: &str, id: &str) -> Result<(), VoteError>;
}

/// Handles a newly created queue record `id` in `room`.
pub fn handle_vote<S: VoteStore>(store: &S, room: &str, id: &str, record: &Value, now_ms: i64) -> VoteOutcome {
    let outcome = match process_vote(store, room, record, now_ms) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Vote {} in room {} failed: {}", id, room, e);
            VoteOutcome::Failed(e.to_string())
        }
    };
    if let Err(e) = store.remove_queued(room, id) {
        error!("Failed to remove vote {} in room {}: {}", id, room, e);
    }
    outcome
}

/// [`handle_vote`] stamped with the current wall-clock time.
pub fn handle_vote_now<S: VoteStore>(store: &S, room: &str, id: &str, record: &Value) -> VoteOutcome {
    handle_vote(store, room, id, record, chrono::Utc::now().timestamp_millis())
}

fn process_vote<S: VoteStore>(store: &S, room: &str, record: &Value, now_ms: i64) -> Result<VoteOutcome, VoteError> {
    let ballot = match Ballot::from_record(record) {
        Some(ballot) => ballot,
        None => {
            debug!("Dropping malformed vote in room {}", room);
            return Ok(VoteOutcome::Rejected(RejectReason::Malformed));
        }
    };

    if store.room_code(room)?.as_deref() != Some(ballot.code.as_str()) {
        debug!("Dropping vote with wrong room code in room {}", room);
        return Ok(VoteOutcome::Rejected(RejectReason::WrongRoomCode));
    }

    if let Some(last) = store.last_vote_ms(room, &ballot.session)? {
        if now_ms - last < COOLDOWN_MS {
            debug!("Session {} is cooling down", ballot.session);
            return Ok(VoteOutcome::Rejected(RejectReason::Cooldown));
        }
    }

    let tally = update_tally(store, room, &ballot.color, now_ms)?;
    store.set_last_vote_ms(room, &ballot.session, now_ms)?;
    info!("Room {}: vote for #{} accepted, leader {}", room, ballot.color, tally.leader);
    Ok(VoteOutcome::Accepted(tally))
}

fn update_tally<S: VoteStore>(store: &S, room: &str, color: &str, now_ms: i64) -> Result<Tally, VoteError> {
    for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
        let (current, version) = store.read_tally(room)?;
        let next = apply_vote(current, color, now_ms);
        if store.swap_tally(room, version, next.clone())? {
            return Ok(next);
        }
        debug!("Tally for room {} changed underneath us (attempt {})", room, attempt);
    }
    Err(VoteError::Contention(MAX_TRANSACTION_ATTEMPTS))
}

#[derive(Debug, Default)]
struct RoomData {
    code: Option<String>,
    sessions: HashMap<String, i64>,
    tally: Option<Tally>,
    version: u64,
    queue: BTreeMap<String, Value>,
}

/// In-memory [`VoteStore`].
#[derive(Debug, Default)]
pub struct MemoryVoteStore {
    rooms: Mutex<HashMap<String, RoomData>>,
}

impl MemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_room_code(&self, room: &str, code: &str) {
        lock_or_recover(&self.rooms).entry(room.to_string()).or_default().code = Some(code.to_string());
    }

    pub fn set_tally(&self, room: &str, tally: Tally) {
        let mut rooms = lock_or_recover(&self.rooms);
        let data = rooms.entry(room.to_string()).or_default();
        data.tally = Some(tally);
        data.version += 1;
    }

    pub fn tally(&self, room: &str) -> Option<Tally> {
        lock_or_recover(&self.rooms).get(room).and_then(|r| r.tally.clone())
    }

    /// Places a record in the room's queue, as a player would.
    pub fn enqueue(&self, room: &str, id: &str, record: Value) {
        lock_or_recover(&self.rooms)
            .entry(room.to_string())
            .or_default()
            .queue
            .insert(id.to_string(), record);
    }

    pub fn queued_ids(&self, room: &str) -> Vec<String> {
        lock_or_recover(&self.rooms)
            .get(room)
            .map(|r| r.queue.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl VoteStore for MemoryVoteStore {
    fn room_code(&self, room: &str) -> Result<Option<String>, VoteError> {
        Ok(lock_or_recover(&self.rooms).get(room).and_then(|r| r.code.clone()))
    }

    fn last_vote_ms(&self, room: &str, session: &str) -> Result<Option<i64>, VoteError> {
        Ok(lock_or_recover(&self.rooms)
            .get(room)
            .and_then(|r| r.sessions.get(session).copied()))
    }

    fn set_last_vote_ms(&self, room: &str, session: &str, ts: i64) -> Result<(), VoteError> {
        lock_or_recover(&self.rooms)
            .entry(room.to_string())
            .or_default()
            .sessions
            .insert(session.to_string(), ts);
        Ok(())
    }

    fn read_tally(&self, room: &str) -> Result<(Option<Tally>, u64), VoteError> {
        Ok(lock_or_recover(&self.rooms)
            .get(room)
            .map(|r| (r.tally.clone(), r.version))
            .unwrap_or((None, 0)))
    }

    fn swap_tally(&self, room: &str, expected: u64, tally: Tally) -> Result<bool, VoteError> {
        let mut rooms = lock_or_recover(&self.rooms);
        let data = rooms.entry(room.to_string()).or_default();
        if data.version != expected {
            return Ok(false);
        }
        data.tally = Some(tally);
        data.version += 1;
        Ok(true)
    }

    fn remove_queued(&self, room: &str, id: &str) -> Result<(), VoteError> {
        if let Some(data) = lock_or_recover(&self.rooms).get_mut(room) {
            data.queue.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_vote_on_empty_tally() {
        let tally = apply_vote(None, "FF0000", 42);
        assert_eq!(tally.counts.get("FF0000"), Some(&1));
        assert_eq!(tally.total, 1);
        assert_eq!(tally.leader, "#FF0000");
        assert_eq!(tally.ts, 42);
    }

    #[test]
    fn test_tie_keeps_leader() {
        let mut counts = BTreeMap::new();
        counts.insert("FF0000".to_string(), 2);
        counts.insert("00FF00".to_string(), 1);
        let tally = Tally {
            counts,
            total: 3,
            leader: "#FF0000".to_string(),
            ts: 7,
        };
        let tally = apply_vote(Some(tally), "00FF00", 99);
        assert_eq!(tally.counts.get("00FF00"), Some(&2));
        assert_eq!(tally.leader, "#FF0000");
        assert_eq!(tally.ts, 7);
    }

    #[test]
    fn test_ballot_validation() {
        let ok = Ballot::from_record(&json!({"hex": "#00ff00", "session": "s1", "code": "1234"})).unwrap();
        assert_eq!(ok.color, "00FF00");
        assert!(Ballot::from_record(&json!({"hex": "00FF0", "session": "s1", "code": "1234"})).is_none());
        assert!(Ballot::from_record(&json!({"hex": "00FF00", "code": "1234"})).is_none());
        assert!(Ballot::from_record(&json!({"hex": "00FF00", "session": "s1"})).is_none());
        let numeric = Ballot::from_record(&json!({"hex": "112233", "session": 5, "code": 1234})).unwrap();
        assert_eq!(numeric.session, "5");
        assert_eq!(numeric.code, "1234");
    }

    #[test]
    fn test_falsy_fields_are_missing() {
        assert!(Ballot::from_record(&json!({"hex": "112233", "session": false, "code": "1234"})).is_none());
        assert!(Ballot::from_record(&json!({"hex": "112233", "session": "s1", "code": 0})).is_none());
        assert!(Ballot::from_record(&json!({"hex": " 112233", "session": "s1", "code": "1234"})).is_none());
        let truthy = Ballot::from_record(&json!({"hex": "112233", "session": true, "code": 7})).unwrap();
        assert_eq!(truthy.session, "true");
        assert_eq!(truthy.code, "7");
    }
}
