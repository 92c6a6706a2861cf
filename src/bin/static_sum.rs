use std::process;

use clap::Parser;
use log::error;

use mpsum::config::{AccumulatorWidth, StaticOptions};
use mpsum::datatype::traits::Accumulate;
use mpsum::reduce_sum::{self, ConsoleReport};
use mpsum::{logging, Universe};

/// The array every rank holds when none is given on the command line
const EXAMPLE: [i32; 8] = [10, 20, 30, 40, 50, 60, 70, 80];

fn run<S: Accumulate>(universe: &Universe, array: &[i32]) -> mpsum::Result<()> {
    universe.launch(|world| {
        reduce_sum::static_sum::<_, S>(&world, array, &mut ConsoleReport::stdout()).map(drop)
    })?;
    Ok(())
}

fn main() {
    let opts = StaticOptions::parse();
    logging::init(opts.common.verbose);

    let array = if opts.values.is_empty() {
        EXAMPLE.to_vec()
    } else {
        opts.values
    };
    let result = mpsum::initialize(opts.common.ranks).and_then(|universe| {
        match opts.common.width {
            AccumulatorWidth::Narrow => run::<i32>(&universe, &array),
            AccumulatorWidth::Wide => run::<i64>(&universe, &array),
        }
    });

    if let Err(err) = result {
        error!("{}", err);
        process::exit(err.exit_code());
    }
}
