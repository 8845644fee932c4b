use super::SimulateArgs;
use anyhow::{Context, Result, anyhow, bail};
use seqtable::schema::execute_script;
use seqtable::structure::DatabaseStructure;
use seqtable::{
    GeneratorConfig, MemoryDatabase, MemoryIsolationDelegate, Session, TableSequenceGenerator,
    dialect,
};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::sync::Arc;
use std::thread;
use tracing::info;

#[derive(Debug)]
pub struct SimulationReport {
    pub table: String,
    pub optimizer: String,
    pub allocated: usize,
    pub unique: usize,
    pub first: Option<i64>,
    pub last: Option<i64>,
    pub row_value: Option<i64>,
    pub times_accessed: u64,
}

impl SimulationReport {
    pub fn duplicates(&self) -> usize {
        self.allocated - self.unique
    }

    pub fn ensure_unique(&self) -> Result<()> {
        if self.duplicates() > 0 {
            bail!("{} duplicate identifiers allocated", self.duplicates());
        }
        Ok(())
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "table:          {}", self.table)?;
        writeln!(f, "optimizer:      {}", self.optimizer)?;
        writeln!(f, "allocated:      {}", self.allocated)?;
        writeln!(f, "unique:         {}", self.unique)?;
        if let (Some(first), Some(last)) = (self.first, self.last) {
            writeln!(f, "range:          {}..={}", first, last)?;
        }
        match self.row_value {
            Some(value) => writeln!(f, "row value:      {}", value)?,
            None => writeln!(f, "row value:      <missing>")?,
        }
        write!(f, "table accesses: {}", self.times_accessed)
    }
}

pub fn load_config(args: &SimulateArgs) -> Result<GeneratorConfig> {
    if let Some(path) = &args.config {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?;
        return GeneratorConfig::from_json(&json)
            .with_context(|| format!("Invalid config '{}'", path.display()));
    }

    let mut config = GeneratorConfig::new(&args.table)
        .increment_size(args.increment)
        .initial_value(args.initial);
    if let Some(kind) = args.optimizer {
        config = config.optimizer(kind);
    }
    config.validate()?;
    Ok(config)
}

pub fn run(args: &SimulateArgs) -> Result<SimulationReport> {
    if args.threads == 0 {
        bail!("--threads must be at least 1");
    }

    let config = load_config(args)?;
    let dialect = dialect::resolve(&args.dialect)?;
    let generator = TableSequenceGenerator::configure(&config, dialect.as_ref())?;

    let db = MemoryDatabase::new();
    {
        let mut conn = db.connect();
        execute_script(&mut conn, &generator.sql_create_strings(dialect.as_ref()))
            .context("Failed to create the counter table")?;
    }
    let session = Session::new(Arc::new(MemoryIsolationDelegate::new(Arc::clone(&db))));

    info!(
        threads = args.threads,
        allocations = args.allocations,
        table = %generator.structure().name(),
        "starting simulation"
    );

    let per_thread = thread::scope(|scope| {
        let workers: Vec<_> = (0..args.threads)
            .map(|_| {
                scope.spawn(|| {
                    (0..args.allocations)
                        .map(|_| generator.generate(&session).map(|v| v.value()))
                        .collect::<seqtable::Result<Vec<i64>>>()
                })
            })
            .collect();

        workers
            .into_iter()
            .map(|worker| {
                worker
                    .join()
                    .map_err(|_| anyhow!("worker thread panicked"))?
                    .map_err(anyhow::Error::from)
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let values: Vec<i64> = per_thread.into_iter().flatten().collect();
    let unique: HashSet<i64> = values.iter().copied().collect();
    let table = generator.structure().name().to_string();
    let row_value = db.column_values(&table)?.first().copied();

    Ok(SimulationReport {
        optimizer: generator.optimizer_kind().to_string(),
        allocated: values.len(),
        unique: unique.len(),
        first: unique.iter().min().copied(),
        last: unique.iter().max().copied(),
        row_value,
        times_accessed: generator.structure().times_accessed(),
        table,
    })
}
