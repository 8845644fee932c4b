//! In-memory model of the objects a schema export has to create.
//!
//! Generators register their tables here; the export renders the model into
//! create/drop scripts for a dialect, followed by the registered init commands.

use crate::connection::Connection;
use crate::core::{Identifier, NumberType, QualifiedName, Result};
use crate::dialect::Dialect;
use log::debug;
use std::collections::BTreeMap;

/// `(catalog, schema)` pair identifying a namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NamespaceName {
    pub catalog: Option<Identifier>,
    pub schema: Option<Identifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    number_type: NumberType,
}

impl Column {
    /// `name` is already rendered for the target dialect.
    pub fn new(name: &str, number_type: NumberType) -> Self {
        Self {
            name: name.to_string(),
            number_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number_type(&self) -> NumberType {
        self.number_type
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: QualifiedName,
    columns: Vec<Column>,
}

impl Table {
    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn add_column(&mut self, column: Column) {
        if !self.columns.iter().any(|c| c.name == column.name) {
            self.columns.push(column);
        }
    }

    pub fn sql_create_string(&self, dialect: &dyn Dialect) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, dialect.type_name(c.number_type)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{} {} ( {} )",
            dialect.create_table_string(),
            self.name.render(dialect),
            columns
        )
    }

    pub fn sql_drop_string(&self, dialect: &dyn Dialect) -> String {
        dialect.drop_table_string(&self.name.render(dialect))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Namespace {
    name: NamespaceName,
    tables: BTreeMap<Identifier, Table>,
}

impl Namespace {
    pub fn name(&self) -> &NamespaceName {
        &self.name
    }

    pub fn locate_table(&self, object: &Identifier) -> Option<&Table> {
        self.tables.get(object)
    }

    /// Creates an empty table, replacing nothing if it already exists.
    pub fn create_table(&mut self, object: Identifier) -> &mut Table {
        let name = QualifiedName::new(
            self.name.catalog.clone(),
            self.name.schema.clone(),
            object.clone(),
        );
        self.tables.entry(object).or_insert_with(|| Table {
            name,
            columns: Vec::new(),
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }
}

/// SQL run once after the tables exist, e.g. seeding a counter row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitCommand {
    statements: Vec<String>,
}

impl InitCommand {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statements: vec![statement.into()],
        }
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }
}

#[derive(Debug, Clone, Default)]
pub struct Database {
    namespaces: BTreeMap<NamespaceName, Namespace>,
    init_commands: Vec<InitCommand>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the namespace, creating it on first use.
    pub fn locate_namespace(
        &mut self,
        catalog: Option<&Identifier>,
        schema: Option<&Identifier>,
    ) -> &mut Namespace {
        let name = NamespaceName {
            catalog: catalog.cloned(),
            schema: schema.cloned(),
        };
        self.namespaces
            .entry(name.clone())
            .or_insert_with(|| Namespace {
                name,
                tables: BTreeMap::new(),
            })
    }

    pub fn locate_table(&self, name: &QualifiedName) -> Option<&Table> {
        let key = NamespaceName {
            catalog: name.catalog().cloned(),
            schema: name.schema().cloned(),
        };
        self.namespaces
            .get(&key)
            .and_then(|ns| ns.locate_table(name.object()))
    }

    pub fn add_init_command(&mut self, command: InitCommand) {
        self.init_commands.push(command);
    }

    pub fn init_commands(&self) -> &[InitCommand] {
        &self.init_commands
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.namespaces.values().flat_map(|ns| ns.tables())
    }

    /// Create statements for every table, then every init command.
    pub fn sql_create_strings(&self, dialect: &dyn Dialect) -> Vec<String> {
        self.tables()
            .map(|t| t.sql_create_string(dialect))
            .chain(
                self.init_commands
                    .iter()
                    .flat_map(|c| c.statements().iter().cloned()),
            )
            .collect()
    }

    pub fn sql_drop_strings(&self, dialect: &dyn Dialect) -> Vec<String> {
        let mut drops: Vec<String> = self.tables().map(|t| t.sql_drop_string(dialect)).collect();
        drops.reverse();
        drops
    }
}

/// Runs a script statement by statement on `conn`.
pub fn execute_script(conn: &mut dyn Connection, statements: &[String]) -> Result<()> {
    for sql in statements {
        debug!("schema export: {}", sql);
        conn.execute(sql)?;
    }
    Ok(())
}
