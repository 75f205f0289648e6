//! ddf CLI - run SQL across the engines declared in a config file
//!
//! Usage:
//!   ddf [--config <file>] engines
//!   ddf [--config <file>] browse [<engine>]
//!   ddf [--config <file>] sql [--engine <name>] [--max-rows <n>] <command>
//!   ddf [--config <file>] load --engine <name> [--header] [--sep <sep>] <url>
//!   ddf [--config <file>] transfer <from> <to> <uri>
//!   ddf [--config <file>] export --engine <name> [--header] [--sep <sep>] <command> <url>
//!
//! Engines are declared as `[[engine]]` tables in the config file; see
//! `ddf::config`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use ddf::content::SqlResult;
use ddf::manager::{sql, ExportSource};
use ddf::{logging, Coordinator, EngineConfig};

#[derive(Parser)]
#[command(name = "ddf")]
#[command(about = "Run SQL and move data between registered engines")]
#[command(version)]
struct Cli {
    /// Engine configuration file (defaults to $DDF_CONFIG, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered engines
    Engines,

    /// List the tables of one engine, or of all of them
    Browse {
        engine: Option<String>,
    },

    /// Run a SQL command
    Sql {
        /// Target engine (the configured default if omitted)
        #[arg(short, long)]
        engine: Option<String>,

        /// Maximum number of rows to fetch
        #[arg(short = 'n', long)]
        max_rows: Option<usize>,

        command: String,
    },

    /// Load a delimited file into an engine
    Load {
        #[arg(short, long)]
        engine: String,

        /// Take column names from the first row
        #[arg(long)]
        header: bool,

        #[arg(short, long, default_value = ",")]
        sep: String,

        url: String,
    },

    /// Pull a table or handle from one engine into another
    Transfer {
        from: String,
        to: String,
        uri: String,
    },

    /// Write the result of a query to a delimited file
    Export {
        #[arg(short, long)]
        engine: String,

        #[arg(long)]
        header: bool,

        #[arg(short, long, default_value = ",")]
        sep: String,

        command: String,
        url: String,
    },
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    match smol::block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::from_env()?,
    };
    let coordinator = Coordinator::with_config(config.clone());
    coordinator
        .register_declared(&config)
        .await
        .context("Failed to register declared engines")?;

    let outcome = dispatch(&coordinator, cli.command).await;
    coordinator.shutdown().await?;
    outcome
}

async fn dispatch(coordinator: &Coordinator, command: Commands) -> Result<()> {
    match command {
        Commands::Engines => {
            let default = coordinator.default_engine();
            for name in coordinator.engine_names() {
                let manager = coordinator.resolve_engine(&name)?;
                let marker = if default.as_deref() == Some(name.as_str()) {
                    " (default)"
                } else {
                    ""
                };
                println!("{}\t{}{}", name, manager.engine_type(), marker);
            }
        }
        Commands::Browse { engine } => match engine {
            Some(name) => print_result(coordinator.browse(&name).await?),
            None => {
                for (name, result) in coordinator.browse_all().await? {
                    println!("-- {}", name);
                    print_result(result);
                }
            }
        },
        Commands::Sql {
            engine,
            max_rows,
            command,
        } => {
            let result = match max_rows {
                Some(n) => {
                    let manager = match engine.as_deref() {
                        Some(name) => coordinator.resolve_engine(name)?,
                        None => {
                            let name = coordinator
                                .default_engine()
                                .ok_or(ddf::DdfError::NoDefaultEngine)?;
                            coordinator.resolve_engine(&name)?
                        }
                    };
                    sql::sql_max_rows(manager.as_ref(), &command, n).await?
                }
                None => coordinator.run_sql(&command, engine.as_deref()).await?,
            };
            print_result(result);
        }
        Commands::Load {
            engine,
            header,
            sep,
            url,
        } => {
            let manager = coordinator.resolve_engine(&engine)?;
            let handle = if header {
                manager.load_table(&url, &sep).await?
            } else {
                manager.load_file(&url, &sep).await?
            };
            println!("{}", handle.uri().unwrap_or_default());
        }
        Commands::Transfer { from, to, uri } => {
            let handle = coordinator.transfer(&from, &to, &uri).await?;
            println!("{}", handle.uri().unwrap_or_default());
        }
        Commands::Export {
            engine,
            header,
            sep,
            command,
            url,
        } => {
            let manager = coordinator.resolve_engine(&engine)?;
            let result = sql::sql(manager.as_ref(), &command).await?;
            manager
                .export(ExportSource::Result(result), &url, &sep, header)
                .await?;
        }
    }
    Ok(())
}

fn print_result(mut result: SqlResult) {
    if result.column_count() == 0 {
        if let Some(affected) = result.rows_affected() {
            println!("{} rows affected", affected);
        }
        return;
    }

    println!("{}", result.column_names().join("\t"));
    while result.next() {
        let cells: Vec<String> = (0..result.column_count())
            .map(|i| result.get_string(i).unwrap_or_else(|| "NULL".to_string()))
            .collect();
        println!("{}", cells.join("\t"));
    }
}
