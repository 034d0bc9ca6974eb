use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::time::Instant;
use tracing::{debug, trace};
use crate::chunk_header::ChunkHeader;
use crate::config::UdpConfig;
use crate::error::ReassemblyError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Incomplete { received: u32, total: u32 },
    /// The message was delivered; the session is kept (without its data) until it expires so
    ///  that re-sent chunks are recognized instead of starting a new message
    Completed { total: u32 },
}

#[derive(Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
    Stored { received: u32, total: u32 },
    /// The chunk was received before; its data was overwritten with the new copy
    Duplicate { received: u32, total: u32 },
    /// This chunk completed the message - the content is concatenated in chunk order
    Completed(Vec<u8>),
    AlreadyCompleted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpiredSession {
    pub sequence: u64,
    pub received: u32,
    pub total: u32,
    pub completed: bool,
}

struct ReassemblySession {
    expected_total: u32,
    chunks: BTreeMap<u32, Vec<u8>>,
    completed: bool,
    last_touched: Instant,
}

impl ReassemblySession {
    fn new(expected_total: u32, now: Instant) -> ReassemblySession {
        ReassemblySession {
            expected_total,
            chunks: BTreeMap::new(),
            completed: false,
            last_touched: now,
        }
    }

    fn num_received(&self) -> u32 {
        self.chunks.len() as u32
    }

    fn state(&self) -> SessionState {
        if self.completed {
            SessionState::Completed { total: self.expected_total }
        }
        else {
            SessionState::Incomplete { received: self.num_received(), total: self.expected_total }
        }
    }

    fn expired(&self, sequence: u64) -> ExpiredSession {
        ExpiredSession {
            sequence,
            received: if self.completed { self.expected_total } else { self.num_received() },
            total: self.expected_total,
            completed: self.completed,
        }
    }
}

/// Server side table of reassembly sessions, keyed by sequence number.
///
/// Chunks may arrive in any order, and they may be lost or duplicated. A session is created
///  by the first chunk for a sequence number that is not currently known, and it completes
///  when every index `0..chunk_total` has been stored - at that point the message's content
///  is returned exactly once.
///
/// Sessions that are not touched for `session_timeout` are dropped by [Reassembler::evict_expired],
///  and the table never holds more than `max_sessions` sessions: when it is full, the least
///  recently touched session makes room for a new one. A session never holds more than
///  `max_message_size` worth of chunks.
///
/// NB: This is not synchronized. The server's receive loop is its only user.
pub struct Reassembler {
    session_timeout: Duration,
    max_sessions: usize,
    max_chunks_per_message: usize,
    sessions: FxHashMap<u64, ReassemblySession>,
    /// (last touched, sequence) for every session, oldest first
    touch_order: BTreeSet<(Instant, u64)>,

    /// sessions that were pushed out because the table was full, pending retrieval through
    ///  `evict_expired`
    displaced: Vec<ExpiredSession>,

    expired_memory: usize,
    expired_order: VecDeque<u64>,
    expired_sequences: FxHashSet<u64>,
}

impl Reassembler {
    pub fn new(config: &UdpConfig) -> Reassembler {
        Reassembler {
            session_timeout: config.session_timeout,
            max_sessions: config.max_sessions,
            max_chunks_per_message: config.max_chunks_per_message(),
            sessions: FxHashMap::default(),
            touch_order: BTreeSet::new(),
            displaced: Vec::new(),
            expired_memory: config.expired_memory,
            expired_order: VecDeque::new(),
            expired_sequences: FxHashSet::default(),
        }
    }

    pub fn num_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Validates the chunk against its header and against the session it belongs to. An
    ///  error means the chunk was not stored and must not be acknowledged.
    pub fn on_chunk(&mut self, header: &ChunkHeader, payload: &[u8], now: Instant) -> Result<ChunkOutcome, ReassemblyError> {
        header.validate()?;
        if header.chunk_total as usize > self.max_chunks_per_message {
            return Err(ReassemblyError::MessageTooLarge {
                chunk_total: header.chunk_total,
                max_chunks: self.max_chunks_per_message,
            });
        }

        if !self.sessions.contains_key(&header.sequence) {
            self.make_room();
        }

        let session = match self.sessions.entry(header.sequence) {
            Entry::Occupied(e) => {
                let session = e.into_mut();
                if session.expected_total != header.chunk_total {
                    return Err(ReassemblyError::TotalMismatch {
                        expected: session.expected_total,
                        actual: header.chunk_total,
                    });
                }
                session
            }
            Entry::Vacant(e) => {
                trace!("starting reassembly of message {} with {} chunks", header.sequence, header.chunk_total);
                if self.expired_sequences.remove(&header.sequence) {
                    self.expired_order.retain(|s| *s != header.sequence);
                }
                e.insert(ReassemblySession::new(header.chunk_total, now))
            }
        };

        self.touch_order.remove(&(session.last_touched, header.sequence));
        session.last_touched = now;
        self.touch_order.insert((now, header.sequence));

        if session.completed {
            return Ok(ChunkOutcome::AlreadyCompleted);
        }

        let is_duplicate = session.chunks.insert(header.chunk_index, payload.to_vec()).is_some();

        if session.num_received() == session.expected_total {
            debug!("message {} is complete", header.sequence);
            session.completed = true;
            let content = std::mem::take(&mut session.chunks)
                .into_values()
                .flatten()
                .collect();
            return Ok(ChunkOutcome::Completed(content));
        }

        let received = session.num_received();
        let total = session.expected_total;
        if is_duplicate {
            Ok(ChunkOutcome::Duplicate { received, total })
        }
        else {
            Ok(ChunkOutcome::Stored { received, total })
        }
    }

    pub fn session_state(&self, sequence: u64) -> Result<SessionState, ReassemblyError> {
        match self.sessions.get(&sequence) {
            Some(session) => Ok(session.state()),
            None if self.expired_sequences.contains(&sequence) => Err(ReassemblyError::SessionExpired(sequence)),
            None => Err(ReassemblyError::SessionNotFound(sequence)),
        }
    }

    /// The indices of the chunks stored so far for an incomplete session
    pub fn received_chunk_indices(&self, sequence: u64) -> Result<Vec<u32>, ReassemblyError> {
        match self.sessions.get(&sequence) {
            Some(session) => Ok(session.chunks.keys().cloned().collect()),
            None if self.expired_sequences.contains(&sequence) => Err(ReassemblyError::SessionExpired(sequence)),
            None => Err(ReassemblyError::SessionNotFound(sequence)),
        }
    }

    /// Drops all sessions that were idle for longer than the session timeout, returning them
    ///  together with sessions that were displaced since the previous call
    pub fn evict_expired(&mut self, now: Instant) -> Vec<ExpiredSession> {
        let mut result = std::mem::take(&mut self.displaced);

        let mut num_evicted = 0;
        while let Some(&(last_touched, sequence)) = self.touch_order.first() {
            if now.saturating_duration_since(last_touched) <= self.session_timeout {
                break;
            }
            self.touch_order.pop_first();
            if let Some(session) = self.sessions.remove(&sequence) {
                result.push(session.expired(sequence));
                num_evicted += 1;
            }
        }
        if num_evicted > 0 {
            debug!("evicted {} idle reassembly sessions", num_evicted);
        }

        for expired in &result {
            // a displaced sequence may have started over in the meantime
            if !expired.completed && !self.sessions.contains_key(&expired.sequence) {
                self.remember_expired(expired.sequence);
            }
        }

        result
    }

    fn make_room(&mut self) {
        if self.sessions.len() < self.max_sessions {
            return;
        }

        if let Some((_, sequence)) = self.touch_order.pop_first() {
            if let Some(session) = self.sessions.remove(&sequence) {
                debug!("reassembly table is full - displacing session {}", sequence);
                self.displaced.push(session.expired(sequence));
            }
        }
    }

    fn remember_expired(&mut self, sequence: u64) {
        if self.expired_memory == 0 || !self.expired_sequences.insert(sequence) {
            return;
        }
        self.expired_order.push_back(sequence);
        while self.expired_order.len() > self.expired_memory {
            if let Some(forgotten) = self.expired_order.pop_front() {
                self.expired_sequences.remove(&forgotten);
            }
        }
    }
}
