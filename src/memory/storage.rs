use crate::core::{Result, SeqError};
use std::collections::HashMap;

pub type IntRow = Vec<i64>;

/// An integer table with a single table-level write lock.
///
/// While a transaction holds the lock, `committed` keeps the rows as they were
/// when the lock was taken; other connections read that image and the owner
/// restores it on rollback.
#[derive(Debug, Clone)]
pub struct MemTable {
    columns: Vec<String>,
    rows: Vec<IntRow>,
    locked_by: Option<u64>,
    committed: Option<Vec<IntRow>>,
}

impl MemTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            locked_by: None,
            committed: None,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| SeqError::Unsupported(format!("unknown column {}", name)))
    }

    pub fn locked_by(&self) -> Option<u64> {
        self.locked_by
    }

    /// Rows as seen by `reader`.
    pub fn visible_rows(&self, reader: u64) -> &[IntRow] {
        match (&self.committed, self.locked_by) {
            (Some(committed), Some(owner)) if owner != reader => committed,
            _ => &self.rows,
        }
    }

    pub fn rows_mut(&mut self) -> &mut Vec<IntRow> {
        &mut self.rows
    }

    pub fn lock(&mut self, owner: u64) {
        if self.locked_by.is_none() {
            self.locked_by = Some(owner);
            self.committed = Some(self.rows.clone());
        }
    }

    pub fn release(&mut self, owner: u64, keep_changes: bool) {
        if self.locked_by != Some(owner) {
            return;
        }
        if let Some(committed) = self.committed.take() {
            if !keep_changes {
                self.rows = committed;
            }
        }
        self.locked_by = None;
    }
}

/// Table-level changes a transaction must undo on rollback.
#[derive(Debug)]
pub enum SchemaUndo {
    Created(String),
    Dropped(String, MemTable),
}

#[derive(Debug, Default)]
pub struct Storage {
    tables: HashMap<String, MemTable>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table(&self, name: &str) -> Result<&MemTable> {
        self.tables
            .get(name)
            .ok_or_else(|| SeqError::TableNotFound(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut MemTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| SeqError::TableNotFound(name.to_string()))
    }

    pub fn create_table(&mut self, name: &str, columns: Vec<String>) -> Result<()> {
        if self.tables.contains_key(name) {
            return Err(SeqError::TableExists(name.to_string()));
        }
        self.tables.insert(name.to_string(), MemTable::new(columns));
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<MemTable> {
        self.tables
            .remove(name)
            .ok_or_else(|| SeqError::TableNotFound(name.to_string()))
    }

    pub fn undo(&mut self, change: SchemaUndo) {
        match change {
            SchemaUndo::Created(name) => {
                self.tables.remove(&name);
            }
            SchemaUndo::Dropped(name, table) => {
                self.tables.insert(name, table);
            }
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }
}
