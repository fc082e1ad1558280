use thiserror::Error;

/// Database error with a classified kind.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
}

#[derive(Debug, Error)]
pub enum DatabaseErrorKind {
    #[error("Row not found")]
    NotFound,

    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Query error: {message}")]
    Query { message: String },

    #[error("Unknown database error: {message}")]
    Unknown { message: String },
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn from_sqlx(error: sqlx::Error) -> Self {
        let kind = match error {
            sqlx::Error::RowNotFound => DatabaseErrorKind::NotFound,
            sqlx::Error::Database(db) => {
                if db.is_unique_violation() {
                    DatabaseErrorKind::UniqueViolation {
                        constraint: db.constraint().unwrap_or("unknown").to_string(),
                    }
                } else {
                    DatabaseErrorKind::Query {
                        message: db.to_string(),
                    }
                }
            }
            sqlx::Error::PoolTimedOut => DatabaseErrorKind::Connection {
                message: "connection pool timed out".to_string(),
            },
            sqlx::Error::Io(e) => DatabaseErrorKind::Connection {
                message: e.to_string(),
            },
            other => DatabaseErrorKind::Unknown {
                message: other.to_string(),
            },
        };
        Self { kind }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::NotFound)
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::UniqueViolation { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::Connection { .. })
    }
}
