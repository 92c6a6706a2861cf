//! Command line configuration shared by the binaries
use clap::{Args, Parser, ValueEnum};

/// Width of the accumulator partial and total sums are computed in
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum AccumulatorWidth {
    /// 32-bit signed, wrapping on overflow
    #[default]
    Narrow,
    /// 64-bit signed, wrapping on overflow
    Wide,
}

/// Options every binary understands
#[derive(Copy, Clone, Debug, Args)]
pub struct Options {
    /// Number of ranks in the process group
    #[arg(short = 'n', long, env = "MPSUM_RANKS", default_value_t = 4)]
    pub ranks: usize,

    /// Accumulator used for partial and total sums
    #[arg(long, value_enum, default_value_t = AccumulatorWidth::Narrow)]
    pub width: AccumulatorWidth,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); `RUST_LOG` takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Distributed sum of an array every rank holds a copy of
#[derive(Clone, Debug, Parser)]
#[command(name = "static-sum", version)]
pub struct StaticOptions {
    /// Group and logging options
    #[command(flatten)]
    pub common: Options,

    /// Array to sum instead of the built-in example
    #[arg(allow_negative_numbers = true)]
    pub values: Vec<i32>,
}

/// Distributed sum of an array read by the coordinator and scattered to all ranks
#[derive(Copy, Clone, Debug, Parser)]
#[command(name = "scatter-sum", version)]
pub struct ScatterOptions {
    /// Group and logging options
    #[command(flatten)]
    pub common: Options,
}
