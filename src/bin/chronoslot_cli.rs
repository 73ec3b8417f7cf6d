use std::error::Error;
use std::io::{self, Write};

use chronoslot::{
    Engine, EngineConfig, Number, NumberType, PartitionPeriod, QueryRequest, Reducer,
    SeriesDefinition, StorageRoot,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chronoslot-cli", version, about = "Chronoslot database tooling")]
struct Cli {
    /// Database root: a directory, a .zip archive or ":memory:".
    #[arg(long = "root")]
    root: String,
    #[arg(long = "read-only")]
    read_only: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List series definitions.
    List,
    Create {
        id: String,
        #[arg(long = "type")]
        number_type: String,
        #[arg(long = "interval")]
        interval: i64,
        #[arg(long = "partition", default_value = "DAY")]
        partition: String,
        #[arg(long = "min", allow_negative_numbers = true)]
        min: Option<f64>,
        #[arg(long = "max", allow_negative_numbers = true)]
        max: Option<f64>,
    },
    Insert {
        id: String,
        timestamp: i64,
        #[arg(allow_negative_numbers = true)]
        value: f64,
        #[arg(long = "reducer")]
        reducer: Option<String>,
    },
    Get {
        id: String,
        timestamp: i64,
    },
    Query {
        id: String,
        from: i64,
        to: i64,
        #[arg(long = "granularity")]
        granularity: Option<i64>,
        #[arg(long = "reducer", default_value = "AVERAGE")]
        reducer: String,
        #[arg(long = "carry-forward")]
        carry_forward: bool,
        #[arg(long = "skip-absent")]
        skip_absent: bool,
    },
    /// List stored partitions of a series.
    Partitions {
        id: String,
    },
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let mut config = EngineConfig::with_root(StorageRoot::parse(&cli.root));
    config.read_only = cli.read_only;
    let engine = Engine::open(config)?;
    let mut out = io::BufWriter::new(io::stdout());

    match cli.command {
        Commands::List => {
            for file in engine.list_series() {
                writeln!(out, "{}", String::from_utf8_lossy(&file.to_json()?))?;
            }
        }
        Commands::Create {
            id,
            number_type,
            interval,
            partition,
            min,
            max,
        } => {
            let number_type = NumberType::parse(&number_type)
                .ok_or_else(|| format!("unknown type {number_type}"))?;
            let partition = PartitionPeriod::parse(&partition)
                .ok_or_else(|| format!("unknown partition {partition}"))?;
            let mut definition = SeriesDefinition::new(id, number_type, interval, partition);
            definition.min = min;
            definition.max = max;
            let file = engine.create_series(definition)?;
            writeln!(out, "{}", String::from_utf8_lossy(&file.to_json()?))?;
        }
        Commands::Insert {
            id,
            timestamp,
            value,
            reducer,
        } => {
            let reducer = reducer.as_deref().map(parse_reducer).transpose()?;
            let report = engine.insert(&id, &[(timestamp, Some(Number::Float(value)))], reducer)?;
            for (key, err) in &report.failed {
                writeln!(out, "failed {key}: {err}")?;
            }
            writeln!(out, "written {}", report.written)?;
        }
        Commands::Get { id, timestamp } => match engine.get(&id, timestamp)? {
            Some(value) => writeln!(out, "{timestamp}\t{value}")?,
            None => writeln!(out, "{timestamp}\t-")?,
        },
        Commands::Query {
            id,
            from,
            to,
            granularity,
            reducer,
            carry_forward,
            skip_absent,
        } => {
            let mut request = QueryRequest::new(from, to)
                .reducer(parse_reducer(&reducer)?)
                .carry_forward(carry_forward)
                .skip_absent(skip_absent);
            request.granularity = granularity;
            for sample in engine.query(&id, &request)? {
                match sample.value {
                    Some(value) => writeln!(out, "{}\t{value}", sample.timestamp)?,
                    None => writeln!(out, "{}\t-", sample.timestamp)?,
                }
            }
        }
        Commands::Partitions { id } => {
            for key in engine.partitions(&id)? {
                writeln!(out, "{}", key.partition_id)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn parse_reducer(name: &str) -> Result<Reducer, String> {
    Reducer::parse(name).ok_or_else(|| format!("unknown reducer {name}"))
}
