use std::fs;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use scriptlite::{Arg, ConnectionHandle, OpenOptions, ResultSet, Shape, Value};
use tracing::Level;

/// CLI-specific result shape with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliShape {
    Table,
    Column,
    Lookup,
    Scalar,
}

impl From<CliShape> for Shape {
    fn from(shape: CliShape) -> Self {
        match shape {
            CliShape::Table => Self::Table,
            CliShape::Column => Self::Column,
            CliShape::Lookup => Self::Lookup,
            CliShape::Scalar => Self::Scalar,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Text,
}

#[derive(Debug, Parser)]
#[command(name = "scriptlite")]
#[command(about = "Run SQLite commands with bound parameters and transactions")]
struct Cli {
    #[command(flatten)]
    open: OpenArgs,
    /// Log more (-v debug, -vv trace). Logs go to stderr.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct OpenArgs {
    /// Database file, `:memory:` or `file:` URI.
    #[arg(long)]
    db: Option<String>,
    /// Connection options as `key=value;` pairs.
    #[arg(long)]
    options: Option<String>,
    /// Create the database file if it does not exist.
    #[arg(long)]
    create_file: bool,
    /// Run everything in one transaction, committed after success.
    #[arg(long)]
    transaction: bool,
    /// Let scoped transactions nest as savepoints.
    #[arg(long)]
    allow_nested_transactions: bool,
    /// Enforce foreign key constraints.
    #[arg(long)]
    foreign_keys: bool,
    /// Open the database read-only.
    #[arg(long)]
    read_only: bool,
    /// YAML file with open options; flags given here take precedence.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl OpenArgs {
    fn to_options(&self) -> Result<OpenOptions, String> {
        let mut options = match &self.config {
            Some(path) => OpenOptions::load(path)
                .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))?,
            None => OpenOptions::default(),
        };
        if let Some(db) = &self.db {
            options.database = db.clone();
        }
        if let Some(extra) = &self.options {
            options.options = extra.clone();
        }
        options.create_file |= self.create_file;
        options.transaction |= self.transaction;
        options.allow_nested_transactions |= self.allow_nested_transactions;
        options.foreign_keys |= self.foreign_keys;
        options.read_only |= self.read_only;
        Ok(options)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a command, optionally printing the number of changed rows.
    Exec(ExecArgs),
    /// Run a command and print its result.
    Query(QueryArgs),
    /// Run a SQL file in a transaction that rolls back on failure.
    Script(ScriptArgs),
}

#[derive(Debug, Args)]
struct ParamArgs {
    /// Positional parameter value (repeatable).
    #[arg(long = "param", value_name = "VALUE")]
    params: Vec<String>,
    /// Named parameter (repeatable).
    #[arg(long = "named", value_name = "NAME=VALUE", value_parser = parse_named)]
    named: Vec<(String, String)>,
    /// Bind a single NULL to the first placeholder.
    #[arg(long, conflicts_with_all = ["params", "named"])]
    null_params: bool,
}

impl ParamArgs {
    fn to_args(&self) -> scriptlite::Args {
        if self.null_params {
            return scriptlite::Args::Null;
        }
        let mut list: Vec<Arg> = self
            .params
            .iter()
            .map(|raw| Arg::Positional(infer_value(raw)))
            .collect();
        if !self.named.is_empty() {
            list.push(Arg::named(
                self.named
                    .iter()
                    .map(|(name, raw)| (name.clone(), infer_value(raw))),
            ));
        }
        scriptlite::Args::List(list)
    }
}

#[derive(Debug, Args)]
struct ExecArgs {
    /// Command text.
    command: String,
    #[command(flatten)]
    params: ParamArgs,
    /// Print the number of changed rows.
    #[arg(long)]
    count: bool,
}

#[derive(Debug, Args)]
struct QueryArgs {
    /// Command text.
    command: String,
    #[command(flatten)]
    params: ParamArgs,
    /// Result shape.
    #[arg(long, default_value = "table")]
    shape: CliShape,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct ScriptArgs {
    /// SQL file to run.
    file: PathBuf,
    /// Run without a scoped transaction.
    #[arg(long)]
    no_transaction: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_ansi(false)
        .init();
}

fn run(cli: Cli) -> Result<(), String> {
    let options = cli.open.to_options()?;
    let db = ConnectionHandle::open(&options).map_err(|err| err.to_string())?;

    match cli.command {
        Command::Exec(args) => run_exec(&db, args)?,
        Command::Query(args) => run_query(&db, args)?,
        Command::Script(args) => run_script(&db, args)?,
    }

    if options.transaction {
        db.commit().map_err(|err| err.to_string())?;
    }
    db.close().map_err(|err| err.to_string())
}

fn run_exec(db: &ConnectionHandle, args: ExecArgs) -> Result<(), String> {
    let bound = args.params.to_args();
    if args.count {
        let changed = db
            .execute_non_query(args.command, bound)
            .map_err(|err| err.to_string())?;
        println!("{changed}");
    } else {
        db.execute(args.command, bound)
            .map_err(|err| err.to_string())?;
    }
    Ok(())
}

fn run_query(db: &ConnectionHandle, args: QueryArgs) -> Result<(), String> {
    let result = db
        .query(args.command, args.params.to_args(), args.shape.into())
        .map_err(|err| err.to_string())?;

    match args.format {
        CliOutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result)
                .map_err(|err| format!("Failed to serialize result: {err}"))?;
            println!("{json}");
        }
        CliOutputFormat::Text => print_text(&result),
    }
    Ok(())
}

fn run_script(db: &ConnectionHandle, args: ScriptArgs) -> Result<(), String> {
    let text = fs::read_to_string(&args.file)
        .map_err(|err| format!("Failed to read '{}': {err}", args.file.display()))?;

    let result = if args.no_transaction {
        db.execute(text, scriptlite::Args::None)
    } else {
        db.use_transaction(|db| db.execute(text.as_str(), scriptlite::Args::None))
    };
    result.map_err(|err| err.to_string())
}

fn print_text(result: &ResultSet) {
    match result {
        ResultSet::NonQueryCount(count) => println!("{count}"),
        ResultSet::Scalar(value) => println!("{value}"),
        ResultSet::Column(values) => {
            for value in values {
                println!("{value}");
            }
        }
        ResultSet::Lookup(lookup) => {
            for (key, value) in lookup {
                println!("{key}\t{value}");
            }
        }
        ResultSet::Table(table) => {
            println!("{}", table.column_names().join("\t"));
            for row in &table.rows {
                let cells: Vec<String> = row.values().iter().map(Value::to_string).collect();
                println!("{}", cells.join("\t"));
            }
        }
    }
}

fn parse_named(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

/// Integer if it parses as one, then real, else text.
fn infer_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(r) = raw.parse::<f64>() {
        Value::Real(r)
    } else {
        Value::Text(raw.to_string())
    }
}
