use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use core_nlsql::{
    Catalog, Config, ExtractedQuery, PgQueryRunner, Pipeline, PipelineError, QueryRunner, extract, get_db_pool,
    setup_logging,
};
use data_model_nlsql::{db::DbPool, query::QueryRows};

#[derive(Parser)]
#[command(name = "nlsql")]
#[command(about = "Ask a Postgres database questions in plain language", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tables the prompt will mention
    Tables,

    /// Print the prompt that would be sent for a question
    Prompt {
        #[arg(short, long)]
        question: String,
    },

    /// Generate SQL for a question
    Ask {
        #[arg(short, long)]
        question: String,
        /// Also run the SQL (read-only) and print each row as a JSON line
        #[arg(short, long)]
        execute: bool,
    },

    /// Run the SQL extractor over a saved model response
    Extract {
        #[arg(short, long, value_parser = validate_input_file)]
        file: PathBuf,
    },
}

fn validate_input_file(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);

    if !path.exists() {
        return Err(format!("Input path does not exist: {}", path.display()));
    }

    if !path.is_file() {
        return Err(format!("Input path is not a file: {}", path.display()));
    }

    Ok(path)
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    setup_logging("core_nlsql=info,nlsql=info");

    match Cli::parse().command {
        Commands::Extract { file } => extract_file(&file),
        Commands::Tables => print_tables().await,
        Commands::Prompt { question } => print_prompt(&question).await,
        Commands::Ask { question, execute } => ask(&question, execute).await,
    }
}

fn extract_file(file: &Path) {
    match std::fs::read_to_string(file) {
        Ok(content) => match extract(&content) {
            ExtractedQuery::Sql(sql) => println!("{sql}"),
            ExtractedQuery::NotFound => {
                eprintln!("No ```sql block in {file:?}");
                std::process::exit(1)
            }
        },
        Err(e) => {
            eprintln!("ERROR: Cannot read file ({file:?}) due to: {e:?}");
            std::process::exit(1)
        }
    }
}

/// Loads the configuration and connects, or exits.
async fn connect() -> (Config, DbPool) {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: Invalid configuration: {e}");
            std::process::exit(1)
        }
    };

    match get_db_pool(&config).await {
        Ok(pool) => (config, pool),
        Err(e) => {
            eprintln!("ERROR: Cannot connect to database: {e}");
            std::process::exit(1)
        }
    }
}

async fn print_tables() {
    let (_, pool) = connect().await;
    match pool.table_names().await {
        Ok(tables) => tables.iter().for_each(|t| println!("{t}")),
        Err(e) => {
            eprintln!("ERROR: Cannot read catalog: {e}");
            std::process::exit(1)
        }
    }
}

async fn print_prompt(question: &str) {
    let (config, pool) = connect().await;
    match Pipeline::from_config(pool, &config).prompt_for(question).await {
        Ok(prompt) => print!("{prompt}"),
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1)
        }
    }
}

async fn ask(question: &str, execute: bool) {
    let (config, pool) = connect().await;
    let runner = PgQueryRunner::new(pool.clone(), config.query_timeout);
    let pipeline = Pipeline::from_config(pool, &config);

    let sql = match pipeline.answer(question).await {
        Ok(sql) if sql.is_empty() => {
            eprintln!("Generation produced no query");
            std::process::exit(2)
        }
        Ok(sql) => sql,
        Err(PipelineError::ExtractionNotFound { response }) => {
            eprintln!("No ```sql block in the model's answer:\n{response}");
            std::process::exit(2)
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1)
        }
    };
    println!("{sql}");

    if execute {
        match runner.run_query(&sql).await {
            Ok(result) => json_lines(&result).iter().for_each(|line| println!("{line}")),
            Err(e) => {
                eprintln!("ERROR: Query failed: {e}");
                std::process::exit(1)
            }
        }
    }
}

/// The column names as a JSON array, then one JSON array per row.
fn json_lines(result: &QueryRows) -> Vec<String> {
    std::iter::once(serde_json::json!(result.columns).to_string())
        .chain(result.rows.iter().map(|row| serde_json::json!(row).to_string()))
        .collect()
}
