use std::io;
use std::process;

use clap::Parser;
use log::error;

use mpsum::config::{AccumulatorWidth, ScatterOptions};
use mpsum::console::Console;
use mpsum::datatype::traits::Accumulate;
use mpsum::reduce_sum::{self, ConsoleReport, COORDINATOR};
use mpsum::traits::*;
use mpsum::{logging, Universe};

fn run<S: Accumulate>(universe: &Universe) -> mpsum::Result<()> {
    universe.launch(|world| {
        let mut report = ConsoleReport::stdout();
        let summary = if world.rank() == COORDINATOR {
            let mut console = Console::new(io::stdin().lock(), io::stdout());
            reduce_sum::scatter_sum::<_, S>(&world, Some(&mut console), &mut report)
        } else {
            reduce_sum::scatter_sum::<_, S>(&world, None, &mut report)
        };
        summary.map(drop)
    })?;
    Ok(())
}

fn main() {
    let opts = ScatterOptions::parse();
    logging::init(opts.common.verbose);

    let result = mpsum::initialize(opts.common.ranks).and_then(|universe| {
        match opts.common.width {
            AccumulatorWidth::Narrow => run::<i32>(&universe),
            AccumulatorWidth::Wide => run::<i64>(&universe),
        }
    });

    if let Err(err) = result {
        error!("{}", err);
        process::exit(err.exit_code());
    }
}
