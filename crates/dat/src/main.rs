#![allow(clippy::print_stderr, clippy::print_stdout)]
mod context;
mod deploy;
mod error;
mod workflow;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use common::CONFIG_FILE_NAME;
use ethers_core::types::{Address, U256};
use tracing_subscriber::EnvFilter;

use context::{Context, Settings};
use error::CliError;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Options {
    /// Harness configuration file.
    #[arg(long, global = true, default_value_t = default_config_path())]
    pub config: Utf8PathBuf,
    /// Log at debug level regardless of RUST_LOG.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Deploy a DAT master copy and initialize it as DAT/DAT.
    Deploy {
        /// Sign with the hardware wallet bridge instead of PRIVATE_KEY.
        #[arg(long, visible_alias = "ledger")]
        hardware: bool,
    },
    /// Initialize a deployed DAT as DXdao/DXD.
    Initialize {
        #[arg(long, value_parser = parse_address)]
        dat: Address,
        #[arg(long, visible_alias = "ledger")]
        hardware: bool,
    },
    /// Capture the governed token's observable state.
    Snapshot {
        /// Write the snapshot as JSON instead of printing it.
        #[arg(long, conflicts_with = "compare")]
        out: Option<Utf8PathBuf>,
        /// Fail if the current state differs from a snapshot written earlier with `--out`.
        #[arg(long, value_name = "FILE")]
        compare: Option<Utf8PathBuf>,
    },
    /// Deploy a new implementation, upgrade the proxy and verify that no state changed.
    Upgrade,
    /// Move the token's treasury to its beneficiary.
    Withdraw {
        #[arg(long, value_enum, default_value_t = AssetChoice::All)]
        asset: AssetChoice,
    },
    /// Burn from the vesting holder and mint to its beneficiary.
    Rebalance {
        /// Amount in base units; defaults to the holder's whole balance.
        #[arg(long, value_parser = parse_amount)]
        amount: Option<U256>,
    },
    /// Hand beneficiary, control and fee collection to one address.
    TransferControl {
        #[arg(long, value_parser = parse_address)]
        to: Address,
    },
    /// Run the whole upgrade campaign.
    Run {
        /// Finish by handing control to `contracts.control_successor`.
        #[arg(long)]
        transfer_control: bool,
    },
    /// Re-create the fork from `network.fork_url` at `network.fork_block`.
    ResetFork,
    /// Print the resolved configuration.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AssetChoice {
    Native,
    Token,
    All,
}

fn default_config_path() -> Utf8PathBuf {
    Utf8PathBuf::from(CONFIG_FILE_NAME)
}

fn parse_address(raw: &str) -> Result<Address, String> {
    let hex = raw.trim().trim_start_matches("0x");
    if hex.len() != 40 {
        return Err(format!("`{raw}` is not a 20-byte hex address"));
    }
    hex.parse()
        .map_err(|_| format!("`{raw}` is not a 20-byte hex address"))
}

fn parse_amount(raw: &str) -> Result<U256, String> {
    U256::from_dec_str(raw.trim()).map_err(|_| format!("`{raw}` is not a decimal amount"))
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let opts = Options::parse();
    init_tracing(opts.verbose);
    if let Err(err) = run(&opts) {
        eprintln!("{} {err}", "Error:".red().bold());
        std::process::exit(1);
    }
}

pub fn run(opts: &Options) -> Result<(), CliError> {
    let settings = Settings::load(&opts.config)?;
    if let Command::Config = opts.command {
        print!("{}", settings.describe());
        return Ok(());
    }

    let context = Context::connect(settings)?;
    match &opts.command {
        Command::Deploy { hardware } => deploy::deploy(&context, *hardware),
        Command::Initialize { dat, hardware } => deploy::initialize(&context, *dat, *hardware),
        Command::Snapshot { out, compare } => {
            workflow::snapshot(&context, out.as_deref(), compare.as_deref())
        }
        Command::Upgrade => workflow::upgrade(&context),
        Command::Withdraw { asset } => workflow::withdraw(&context, *asset),
        Command::Rebalance { amount } => workflow::rebalance(&context, *amount),
        Command::TransferControl { to } => workflow::transfer_control(&context, *to),
        Command::Run { transfer_control } => workflow::run_campaign(&context, *transfer_control),
        Command::ResetFork => context.reset_fork(),
        Command::Config => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_global_options_after_subcommand() {
        let opts = Options::try_parse_from([
            "dat",
            "initialize",
            "--dat",
            "0xa1d65E8fB6e87b60FECCBc582F7f97804B725521",
            "--ledger",
            "--config",
            "fork.toml",
        ])
        .unwrap();
        assert_eq!(opts.config, Utf8PathBuf::from("fork.toml"));
        match opts.command {
            Command::Initialize { dat, hardware } => {
                assert_eq!(
                    format!("{dat:#x}"),
                    "0xa1d65e8fb6e87b60feccbc582f7f97804b725521"
                );
                assert!(hardware);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn defaults() {
        let opts = Options::try_parse_from(["dat", "withdraw"]).unwrap();
        assert_eq!(opts.config, Utf8PathBuf::from("dat.toml"));
        assert!(!opts.verbose);
        assert!(matches!(
            opts.command,
            Command::Withdraw {
                asset: AssetChoice::All
            }
        ));
        let opts = Options::try_parse_from(["dat", "rebalance"]).unwrap();
        assert!(matches!(opts.command, Command::Rebalance { amount: None }));
        let opts =
            Options::try_parse_from(["dat", "snapshot", "--compare", "before.json"]).unwrap();
        match opts.command {
            Command::Snapshot { out, compare } => {
                assert_eq!(out, None);
                assert_eq!(compare, Some(Utf8PathBuf::from("before.json")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_arguments() {
        assert!(Options::try_parse_from(["dat", "transfer-control", "--to", "0x1234"]).is_err());
        assert!(Options::try_parse_from(["dat", "rebalance", "--amount", "1e18"]).is_err());
        assert!(Options::try_parse_from(["dat", "initialize"]).is_err());
        assert!(
            Options::try_parse_from(["dat", "snapshot", "--out", "a.json", "--compare", "b.json"])
                .is_err()
        );
        assert_eq!(
            parse_amount("2500000000000000000000").unwrap(),
            U256::exp10(21) * 25 / 10
        );
    }
}
