use roster_common::TeamId;
use uuid::Uuid;

/// Result type alias for canonical store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached at all (auth, DNS, pool exhausted).
    #[error("Store unreachable: {0}")]
    Connection(String),

    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    #[error("Athlete not found: {0}")]
    AthleteNotFound(Uuid),

    /// A single record was rejected; other records may still be written.
    #[error("Write rejected: {0}")]
    Write(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Whether the whole run should stop: the store itself is gone, as opposed
    /// to one record failing.
    pub fn is_fatal(&self) -> bool {
        match self {
            StoreError::Connection(_) | StoreError::Migration(_) => true,
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Configuration(_)
            ),
            StoreError::TeamNotFound(_) | StoreError::AthleteNotFound(_) | StoreError::Write(_) => {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_failures_are_fatal() {
        assert!(StoreError::Connection("refused".into()).is_fatal());
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_fatal());
    }

    #[test]
    fn record_failures_are_not_fatal() {
        assert!(!StoreError::Write("check constraint".into()).is_fatal());
        assert!(!StoreError::TeamNotFound(7).is_fatal());
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_fatal());
    }
}
