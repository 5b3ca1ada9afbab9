//! In-memory keyspace/table bookkeeping for auto schema management.
//!
//! Tables created by the script are assigned to the first configured
//! keyspace. Applying VSchema to a running cluster is not done here; a table
//! counts as authoritative once it is known in the requested keyspace.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, anyhow, bail};
use tracing::{debug, info};

use crate::core::statement::Statement;
use crate::io::backend::{SchemaManager, SchemaReady};

#[derive(Debug, Clone, Default)]
pub struct LocalSchema {
    keyspaces: Vec<String>,
    tables: BTreeMap<String, BTreeSet<String>>,
}

impl LocalSchema {
    pub fn new(keyspaces: Vec<String>) -> Self {
        let tables = keyspaces
            .iter()
            .map(|ks| (ks.clone(), BTreeSet::new()))
            .collect();
        Self { keyspaces, tables }
    }

    /// Seed known tables per keyspace. Unlisted keyspaces are added.
    pub fn with_tables(mut self, tables: &BTreeMap<String, Vec<String>>) -> Self {
        for (keyspace, names) in tables {
            if !self.keyspaces.contains(keyspace) {
                self.keyspaces.push(keyspace.clone());
            }
            self.tables
                .entry(keyspace.clone())
                .or_default()
                .extend(names.iter().cloned());
        }
        self
    }

    pub fn tables(&self, keyspace: &str) -> Option<&BTreeSet<String>> {
        self.tables.get(keyspace)
    }
}

impl SchemaManager for LocalSchema {
    fn on_create_table(&mut self, statement: &Statement) -> Result<SchemaReady> {
        let table = statement
            .created_table()
            .ok_or_else(|| anyhow!("not a create table statement: {}", statement.sql))?
            .to_string();
        let keyspace = self
            .keyspaces
            .first()
            .ok_or_else(|| anyhow!("no keyspace configured for table {table}"))?
            .clone();
        info!(%keyspace, %table, "registering created table");
        self.tables
            .entry(keyspace.clone())
            .or_default()
            .insert(table.clone());
        Ok(Box::new(move || {
            debug!(%keyspace, %table, "schema ready");
            Ok(())
        }))
    }

    fn find_table(&self, table: &str) -> Result<String> {
        let mut found = self
            .keyspaces
            .iter()
            .filter(|ks| self.tables.get(*ks).is_some_and(|t| t.contains(table)));
        match (found.next(), found.next()) {
            (Some(keyspace), None) => Ok(keyspace.clone()),
            (Some(_), Some(_)) => bail!("table {table} found in multiple keyspaces"),
            (None, _) => bail!("table {table} not found in any keyspace"),
        }
    }

    fn wait_for_authoritative(&mut self, keyspace: &str, table: &str) -> Result<()> {
        let known = self
            .tables
            .get(keyspace)
            .ok_or_else(|| anyhow!("unknown keyspace {keyspace}"))?;
        if !known.contains(table) {
            bail!("table {table} has no schema in keyspace {keyspace}");
        }
        Ok(())
    }
}
