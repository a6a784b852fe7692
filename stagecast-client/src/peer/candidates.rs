use stagecast_core::CandidateInit;

/// Gate between candidate arrival and candidate application.
///
/// Candidates buffered while the gate is closed are released in arrival
/// order by [`CandidateGate::open`], exactly once; after that every pushed
/// candidate passes straight through. The gate is owned by its peer link and
/// must be discarded with it; a replacement link gets a fresh gate.
#[derive(Debug, Default)]
pub struct CandidateGate {
    open: bool,
    buffered: Vec<CandidateInit>,
}

impl CandidateGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand over a freshly arrived candidate. Returns it back when the gate
    /// is open (apply immediately); buffers it otherwise.
    pub fn push(&mut self, candidate: CandidateInit) -> Option<CandidateInit> {
        if self.open {
            Some(candidate)
        } else {
            self.buffered.push(candidate);
            None
        }
    }

    /// Open the gate: the remote description has been applied. Returns every
    /// buffered candidate in FIFO order. Later calls return nothing.
    pub fn open(&mut self) -> Vec<CandidateInit> {
        self.open = true;
        std::mem::take(&mut self.buffered)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }
}
