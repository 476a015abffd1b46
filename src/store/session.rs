// src/store/session.rs
use crate::store::connection::SqlConnection;
use crate::store::StoreError;

/// An open connection with a run-wide transaction in progress.
///
/// `release` consumes the session, so nothing can touch the connection afterwards.
pub struct Session<C: SqlConnection> {
    conn: C,
}

/// Proof that a session was committed (or attempted) and closed.
#[derive(Debug)]
#[must_use]
pub struct Released {
    pub committed: bool,
}

impl<C: SqlConnection> Session<C> {
    pub async fn begin(mut conn: C) -> Result<Self, StoreError> {
        if let Err(source) = conn.execute("BEGIN", &[]).await {
            // Nothing to commit; still hand the connection back to the engine.
            let _ = conn.close().await;
            return Err(StoreError::Connection(source));
        }
        Ok(Self { conn })
    }

    pub fn conn(&mut self) -> &mut C {
        &mut self.conn
    }

    pub async fn savepoint(&mut self, name: &str) -> Result<(), StoreError> {
        self.control("savepoint", &format!("SAVEPOINT {name}")).await
    }

    pub async fn release_savepoint(&mut self, name: &str) -> Result<(), StoreError> {
        self.control("release savepoint", &format!("RELEASE SAVEPOINT {name}"))
            .await
    }

    pub async fn rollback_to(&mut self, name: &str) -> Result<(), StoreError> {
        self.control("rollback to savepoint", &format!("ROLLBACK TO SAVEPOINT {name}"))
            .await
    }

    /// Commit and close. The close is attempted even when the commit fails.
    pub async fn release(mut self) -> (Released, Result<(), StoreError>) {
        let commit = self.control("commit", "COMMIT").await;
        let committed = commit.is_ok();
        let close = self
            .conn
            .close()
            .await
            .map_err(|source| StoreError::Operation {
                op: "close",
                table: None,
                source,
            });
        (Released { committed }, commit.and(close))
    }

    async fn control(&mut self, op: &'static str, sql: &str) -> Result<(), StoreError> {
        self.conn
            .execute(sql, &[])
            .await
            .map(|_| ())
            .map_err(|source| StoreError::Operation {
                op,
                table: None,
                source,
            })
    }
}
