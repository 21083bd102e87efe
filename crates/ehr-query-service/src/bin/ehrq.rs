//! ehrq - query a tabular patient dataset from the command line.
//!
//! ## Quick Start
//!
//! ```bash
//! export EHRQ_DATASET=data/ehr_records.csv
//!
//! # Structured filter
//! ehrq filter --age-min 40 --age-max 80 --condition diabetes --limit 20
//!
//! # Textual query
//! ehrq sql "SELECT * FROM ehr_records WHERE region LIKE '%north%' GROUP BY gender"
//!
//! # Group-by count
//! ehrq aggregate condition --region london
//!
//! # Statistics and capabilities
//! ehrq status
//!
//! # Raw JSON request (use - to read stdin)
//! echo '{"type":"sql","query":"SELECT * LIMIT 5"}' | ehrq request -
//! ```
//!
//! Responses are printed as pretty JSON on stdout; logs go to stderr and are
//! filtered with `RUST_LOG` (default `info`). The process exits with status 1
//! when the response is an error.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ehr_query_executor::FileSource;
use ehr_query_service::{
    AggregateDimension, AggregateFilter, FilterCriteria, QueryService, Request, ServiceConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ehrq")]
#[command(about = "Query a tabular patient dataset", long_about = None)]
struct Cli {
    /// Path to the delimited dataset
    #[arg(short, long, env = "EHRQ_DATASET")]
    dataset: PathBuf,

    /// Seconds a parsed record snapshot stays valid
    #[arg(long, env = "EHRQ_RECORD_TTL_SECS")]
    record_ttl_secs: Option<u64>,

    /// Seconds a statistics snapshot stays valid
    #[arg(long, env = "EHRQ_STATS_TTL_SECS")]
    stats_ttl_secs: Option<u64>,

    /// Filter records in parallel
    #[arg(long)]
    parallel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter records by attributes
    Filter {
        /// Minimum age (inclusive)
        #[arg(long)]
        age_min: Option<u32>,
        /// Maximum age (inclusive)
        #[arg(long)]
        age_max: Option<u32>,
        /// Chronic condition substring
        #[arg(long)]
        condition: Option<String>,
        /// Medication substring
        #[arg(long)]
        medication: Option<String>,
        /// Region substring
        #[arg(long)]
        region: Option<String>,
        /// Exact gender
        #[arg(long)]
        gender: Option<String>,
        /// Visit diagnosis substring
        #[arg(long)]
        diagnosis: Option<String>,
        /// Maximum records to return
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Run a SELECT ... FROM ... WHERE ... GROUP BY ... LIMIT query
    Sql {
        /// Query text
        query: String,
    },
    /// Count records by age, gender, region, condition or medication
    Aggregate {
        /// Dimension to group by
        dimension: AggregateDimension,
        /// Chronic condition substring
        #[arg(long)]
        condition: Option<String>,
        /// Region substring
        #[arg(long)]
        region: Option<String>,
        /// Exact gender
        #[arg(long)]
        gender: Option<String>,
    },
    /// Show dataset statistics and capabilities
    Status,
    /// Send a raw JSON request
    Request {
        /// JSON body, or - to read stdin
        body: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ServiceConfig::from_env().context("Failed to read EHRQ_* configuration")?;
    if let Some(secs) = cli.record_ttl_secs {
        config.engine.cache.record_ttl = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.stats_ttl_secs {
        config.engine.cache.statistics_ttl = Duration::from_secs(secs);
    }
    config.engine.parallel |= cli.parallel;

    let service = QueryService::from_source(FileSource::new(&cli.dataset), &config);

    let response = match build_input(cli.command)? {
        Input::Json(body) => service.handle_json(&body),
        Input::Request(request) => service.handle(&request),
    };

    let rendered =
        serde_json::to_string_pretty(&response).context("Failed to serialize response")?;
    println!("{}", rendered);

    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

/// What to send to the service.
enum Input {
    Json(String),
    Request(Request),
}

fn build_input(command: Commands) -> Result<Input> {
    let request = match command {
        Commands::Filter {
            age_min,
            age_max,
            condition,
            medication,
            region,
            gender,
            diagnosis,
            limit,
        } => Request::Filter {
            filters: FilterCriteria {
                age_min,
                age_max,
                condition,
                medication,
                region,
                gender,
                diagnosis,
            },
            limit,
        },
        Commands::Sql { query } => Request::Sql { query },
        Commands::Aggregate {
            dimension,
            condition,
            region,
            gender,
        } => {
            let filter = AggregateFilter {
                condition,
                region,
                gender,
            };
            Request::Aggregate {
                group_by: dimension,
                filter: (filter != AggregateFilter::default()).then_some(filter),
            }
        }
        Commands::Status => Request::Status,
        Commands::Request { body } if body == "-" => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            return Ok(Input::Json(buf));
        }
        Commands::Request { body } => return Ok(Input::Json(body)),
    };
    Ok(Input::Request(request))
}
