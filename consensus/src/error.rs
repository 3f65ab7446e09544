use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsensusError {
    /// No active witnesses; nothing can be scheduled until the registry
    /// is repopulated.
    #[error("active witness schedule is empty")]
    EmptySchedule,
}
