use super::DdlArgs;
use anyhow::{Context, Result};
use seqtable::schema::Database;
use seqtable::{GeneratorConfig, TableSequenceGenerator, dialect};

/// Builds the create or drop script for the table described by `args`.
pub fn script(args: &DdlArgs) -> Result<Vec<String>> {
    let dialect = dialect::resolve(&args.dialect)?;
    let config = GeneratorConfig::new(&args.table)
        .value_column(&args.column)
        .initial_value(args.initial);
    let generator = TableSequenceGenerator::configure(&config, dialect.as_ref())
        .with_context(|| format!("Invalid table definition '{}'", args.table))?;

    let mut database = Database::new();
    generator.register_exportables(&mut database);

    Ok(if args.drop {
        database.sql_drop_strings(dialect.as_ref())
    } else {
        database.sql_create_strings(dialect.as_ref())
    })
}
