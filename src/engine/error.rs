use ulid::Ulid;

use crate::model::BookingStatus;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Creation rejected: the candidate interval overlaps these bookings.
    Conflict(Vec<Ulid>),
    /// Transition out of `completed` or `cancelled` attempted.
    TerminalStatus { id: Ulid, status: BookingStatus },
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict(ids) => {
                write!(f, "conflicts with existing booking(s):")?;
                for id in ids {
                    write!(f, " {id}")?;
                }
                Ok(())
            }
            EngineError::TerminalStatus { id, status } => {
                write!(f, "booking {id} is {status}: no further transitions")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
