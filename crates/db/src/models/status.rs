//! Status helper enums mapping to SMALLSERIAL lookup tables.
//!
//! Each enum variant's discriminant matches the seed data in the
//! corresponding `*_statuses` table.

use serde::Serialize;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

/// Lifecycle of an asynchronous render job.
///
/// Transitions only move forward: `Pending -> Processing -> Done | Failed`.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending = 1,
    Processing = 2,
    Done = 3,
    Failed = 4,
}

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Map a database status ID back to the enum.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Processing),
            3 => Some(Self::Done),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    /// `Done` and `Failed` are final; nothing leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self -> next` is a legal forward transition.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Done)
                | (Self::Processing, Self::Failed)
                | (Self::Pending, Self::Failed)
        )
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_match_seed_data() {
        assert_eq!(JobStatus::Pending.id(), 1);
        assert_eq!(JobStatus::Processing.id(), 2);
        assert_eq!(JobStatus::Done.id(), 3);
        assert_eq!(JobStatus::Failed.id(), 4);
    }

    #[test]
    fn from_id_round_trips() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Done,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(JobStatus::from_id(0), None);
    }

    #[test]
    fn transitions_only_move_forward() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Done));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Pending.can_transition_to(Done));
    }
}
