use std::path::PathBuf;

use clap::Parser;

use super::constants::{ENV_CONFIG, ENV_REDIS_HOST, ENV_REDIS_PORT};
use crate::stages::Stage;

#[derive(Parser, Debug)]
#[command(name = "ragmill")]
#[command(version, about = "Staged RAG ingestion pipeline worker", long_about = None)]
pub struct Cli {
    /// Worker stage to run
    #[arg(long = "type", value_enum)]
    pub worker_type: Stage,

    /// Worker instance id within the stage's consumer group
    #[arg(long, default_value_t = 0)]
    pub id: u32,

    /// Path to config file
    #[arg(long, short = 'c', env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Redis host for the queue substrate
    #[arg(long, env = ENV_REDIS_HOST)]
    pub redis_host: Option<String>,

    /// Redis port for the queue substrate
    #[arg(long, env = ENV_REDIS_PORT)]
    pub redis_port: Option<u16>,

    /// Enqueue one source file into the stage's topic before the loop
    /// starts (clean stage bootstrap)
    #[arg(long)]
    pub seed: Option<String>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_and_id() {
        let cli = Cli::parse_from(["ragmill", "--type", "chunk", "--id", "3"]);
        assert_eq!(cli.worker_type, Stage::Chunk);
        assert_eq!(cli.id, 3);
        assert!(cli.seed.is_none());
    }

    #[test]
    fn test_id_defaults_to_zero() {
        let cli = Cli::parse_from(["ragmill", "--type", "index"]);
        assert_eq!(cli.id, 0);
    }

    #[test]
    fn test_seed_flag() {
        let cli = Cli::parse_from(["ragmill", "--type", "clean", "--seed", "data/in.xlsx"]);
        assert_eq!(cli.seed.as_deref(), Some("data/in.xlsx"));
    }

    #[test]
    fn test_rejects_unknown_stage() {
        assert!(Cli::try_parse_from(["ragmill", "--type", "rank"]).is_err());
    }
}
