use crate::chunk_header::ChunkHeader;
use crate::error::DeliveryError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// The chunk is due to be (re-)sent
    Sent,
    AwaitingAck,
    Acked,
    TimedOut,
    Failed,
}

/// What the driver of a [ChunkTransmission] should do next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextStep {
    Send,
    AwaitAck,
    Done,
    GiveUp,
}

/// The acknowledgment discipline for a single chunk, as a state machine without any I/O:
///
/// ```ascii
/// Sent -> AwaitingAck -> Acked
///              |
///              +-> TimedOut -> Sent       (attempts left)
///                     |
///                     +-> Failed          (attempt budget used up)
/// ```
///
/// This can be driven by blocking calls as well as by an async task - see `client.rs`.
#[derive(Debug)]
pub struct ChunkTransmission {
    header: ChunkHeader,
    max_attempts: u32,
    attempts: u32,
    state: ChunkState,
}

impl ChunkTransmission {
    pub fn new(header: ChunkHeader, max_attempts: u32) -> ChunkTransmission {
        assert!(max_attempts > 0);
        ChunkTransmission {
            header,
            max_attempts,
            attempts: 0,
            state: ChunkState::Sent,
        }
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn next_step(&self) -> NextStep {
        match self.state {
            ChunkState::Sent => NextStep::Send,
            ChunkState::AwaitingAck => NextStep::AwaitAck,
            ChunkState::Acked => NextStep::Done,
            ChunkState::TimedOut => {
                if self.attempts < self.max_attempts {
                    NextStep::Send
                }
                else {
                    NextStep::GiveUp
                }
            }
            ChunkState::Failed => NextStep::GiveUp,
        }
    }

    /// The chunk was handed to the socket
    pub fn on_sent(&mut self) {
        match self.state {
            ChunkState::Sent | ChunkState::TimedOut => {
                self.attempts += 1;
                self.state = ChunkState::AwaitingAck;
            }
            other => panic!("chunk cannot be sent in state {:?}", other),
        }
    }

    /// Returns `true` if the datagram is the acknowledgment for this chunk. Anything else
    ///  (typically a late ack for an earlier chunk) is ignored.
    pub fn on_reply(&mut self, reply: &[u8]) -> bool {
        if self.state != ChunkState::AwaitingAck {
            return false;
        }
        if reply != self.header.to_bytes() {
            return false;
        }
        self.state = ChunkState::Acked;
        true
    }

    pub fn on_timeout(&mut self) {
        if self.state != ChunkState::AwaitingAck {
            return;
        }
        self.state = if self.attempts < self.max_attempts {
            ChunkState::TimedOut
        }
        else {
            ChunkState::Failed
        };
    }

    pub fn failure(&self) -> Option<DeliveryError> {
        if self.state != ChunkState::Failed {
            return None;
        }
        Some(DeliveryError::RetriesExhausted {
            chunk_index: self.header.chunk_index,
            chunk_total: self.header.chunk_total,
            attempts: self.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const HEADER: ChunkHeader = ChunkHeader { sequence: 7, chunk_index: 1, chunk_total: 3 };

    #[test]
    fn test_acked_on_first_attempt() {
        let mut t = ChunkTransmission::new(HEADER, 3);
        assert_eq!(t.next_step(), NextStep::Send);
        t.on_sent();
        assert_eq!(t.next_step(), NextStep::AwaitAck);
        assert!(t.on_reply(&HEADER.to_bytes()));
        assert_eq!(t.state(), ChunkState::Acked);
        assert_eq!(t.next_step(), NextStep::Done);
        assert_eq!(t.attempts(), 1);
        assert!(t.failure().is_none());
    }

    #[rstest]
    #[case::other_chunk(ChunkHeader { sequence: 7, chunk_index: 0, chunk_total: 3 }.to_bytes().to_vec())]
    #[case::other_message(ChunkHeader { sequence: 6, chunk_index: 1, chunk_total: 3 }.to_bytes().to_vec())]
    #[case::truncated(HEADER.to_bytes()[..15].to_vec())]
    #[case::empty(vec![])]
    fn test_foreign_reply_is_ignored(#[case] reply: Vec<u8>) {
        let mut t = ChunkTransmission::new(HEADER, 3);
        t.on_sent();
        assert!(!t.on_reply(&reply));
        assert_eq!(t.state(), ChunkState::AwaitingAck);
    }

    #[rstest]
    #[case::single_attempt(1)]
    #[case::default(3)]
    #[case::many(10)]
    fn test_gives_up_after_exactly_max_attempts(#[case] max_attempts: u32) {
        let mut t = ChunkTransmission::new(HEADER, max_attempts);
        let mut num_sent = 0;
        loop {
            match t.next_step() {
                NextStep::Send => {
                    t.on_sent();
                    num_sent += 1;
                }
                NextStep::AwaitAck => t.on_timeout(),
                NextStep::Done => panic!("no ack was received"),
                NextStep::GiveUp => break,
            }
        }
        assert_eq!(num_sent, max_attempts);
        assert_eq!(t.state(), ChunkState::Failed);
        assert_eq!(t.failure(), Some(DeliveryError::RetriesExhausted { chunk_index: 1, chunk_total: 3, attempts: max_attempts }));
    }

    #[test]
    fn test_acked_on_last_attempt() {
        let mut t = ChunkTransmission::new(HEADER, 3);
        for _ in 0..2 {
            t.on_sent();
            t.on_timeout();
            assert_eq!(t.state(), ChunkState::TimedOut);
            assert_eq!(t.next_step(), NextStep::Send);
        }
        t.on_sent();
        assert!(t.on_reply(&HEADER.to_bytes()));
        assert_eq!(t.next_step(), NextStep::Done);
        assert_eq!(t.attempts(), 3);
    }
}
