// Copyright 2023 Remi Bernotavicius

use crate::{Error, Result};
use diesel::connection::{AnsiTransactionManager, SimpleConnection as _, TransactionManager};
use diesel::prelude::Connection as _;

pub mod models;
pub mod query;
pub mod schema;

pub type Connection = diesel::sqlite::SqliteConnection;

type Transactions = AnsiTransactionManager;

/// Hands out a fresh [`Session`] against a fixed database URL.
#[derive(Debug, Clone)]
pub struct ConnectionProvider {
    database_url: String,
}

impl ConnectionProvider {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn session(&self) -> Result<Session> {
        let mut conn = Connection::establish(&self.database_url)?;
        // SQLite leaves foreign keys off unless asked, per connection.
        conn.batch_execute("PRAGMA foreign_keys = ON")?;
        Ok(Session {
            conn,
            in_transaction: false,
        })
    }
}

/// One connection, used for at most one transaction at a time. Dropping the session rolls back
/// anything left uncommitted and closes the connection.
pub struct Session {
    conn: Connection,
    in_transaction: bool,
}

impl Session {
    pub fn begin(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(Error::invalid("nested transactions are not supported"));
        }
        <Transactions as TransactionManager<Connection>>::begin_transaction(&mut self.conn)?;
        self.in_transaction = true;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(Error::invalid("no transaction to commit"));
        }
        let result =
            <Transactions as TransactionManager<Connection>>::commit_transaction(&mut self.conn);
        if result.is_ok() {
            self.in_transaction = false;
        }
        Ok(result?)
    }

    pub fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(Error::invalid("no transaction to roll back"));
        }
        self.in_transaction = false;
        <Transactions as TransactionManager<Connection>>::rollback_transaction(&mut self.conn)?;
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Runs `work` between `begin` and `commit`, rolling back if it (or the commit) fails.
    pub fn transaction<T>(
        &mut self,
        operation: &str,
        work: impl FnOnce(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        self.begin()?;
        match work(&mut self.conn).and_then(|value| self.commit().map(|()| value)) {
            Ok(value) => Ok(value),
            Err(e) => {
                log::warn!("{operation} failed, rolling back: {e}");
                if self.in_transaction() {
                    if let Err(rollback_error) = self.rollback() {
                        log::warn!("{operation}: rollback failed: {rollback_error}");
                    }
                }
                Err(e)
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.in_transaction {
            log::warn!("session dropped inside a transaction, rolling back");
            if let Err(e) =
                <Transactions as TransactionManager<Connection>>::rollback_transaction(
                    &mut self.conn,
                )
            {
                log::warn!("rollback on drop failed: {e}");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::ConnectionProvider;
    use crate::service::script;
    use std::path::Path;

    pub fn resource_dir() -> &'static Path {
        Path::new(crate::service::DEFAULT_RESOURCE_DIR)
    }

    /// An empty database file that lives as long as the returned directory.
    pub fn empty_database() -> (tempfile::TempDir, ConnectionProvider) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipes.sqlite");
        let provider = ConnectionProvider::new(path.to_str().unwrap());
        (dir, provider)
    }

    /// A database with the bundled schema and seed data loaded.
    pub fn seeded_database() -> (tempfile::TempDir, ConnectionProvider) {
        let (dir, provider) = empty_database();
        let dao = crate::database::query::RecipeDao::new(provider.clone());
        for file in ["recipe_schema.sql", "recipe_data.sql"] {
            let statements = script::load_script(resource_dir().join(file)).unwrap();
            dao.execute_batch(&statements).unwrap();
        }
        (dir, provider)
    }
}
