use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Waiting { remaining: usize },
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateOvercount {
    pub total: usize,
}

impl Display for GateOvercount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Completion arrived after all {} slots completed", self.total)
    }
}

impl Error for GateOvercount {}

/// N-of-N completion barrier shared by every fan-out stage.
///
/// The total is fixed at construction. Each arrival counts once, whatever
/// the order, and the gate reports [`GateState::Open`] exactly once.
#[derive(Debug, Clone)]
pub struct CompletionGate {
    total: usize,
    arrived: usize,
}

impl CompletionGate {
    pub fn new(total: usize) -> Self {
        Self { total, arrived: 0 }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn arrived(&self) -> usize {
        self.arrived
    }

    pub fn is_open(&self) -> bool {
        self.arrived >= self.total
    }

    pub fn arrive(&mut self) -> Result<GateState, GateOvercount> {
        if self.is_open() {
            return Err(GateOvercount { total: self.total });
        }
        self.arrived += 1;
        if self.is_open() {
            Ok(GateState::Open)
        } else {
            Ok(GateState::Waiting {
                remaining: self.total - self.arrived,
            })
        }
    }
}
