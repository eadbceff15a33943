use std::io;

use colored::{Color, ColoredString, Colorize};
use log::Level;
use structopt::StructOpt;

use crate::driver::{CheckOptions, Driver, EvalOptions};

mod check;
mod eval;

#[derive(Debug, StructOpt)]
pub struct Cli {
    #[structopt(
        long, env = "LOG_LEVEL",
        help = "Sets the log level",
        default_value = "info",
        possible_values = &["off", "error", "warn", "info", "debug", "trace"],
        global = true
    )]
    log_level: log::LevelFilter,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    #[structopt(about = "Type check an expression file")]
    Check(CheckOptions),
    #[structopt(about = "Type check and evaluate an expression file")]
    Eval(EvalOptions),
}

pub fn run() {
    let cli: Cli = Cli::from_args();

    // set up logging
    fern::Dispatch::new()
        .format(move |out, message, record| {
            let level = record.level();
            let color = match level {
                Level::Error => Color::Red,
                Level::Warn => Color::Yellow,
                Level::Info => Color::Blue,
                Level::Debug => Color::Magenta,
                Level::Trace => Color::Green,
            };
            out.finish(format_args!(
                "{} {}",
                ColoredString::from((level.to_string().to_lowercase() + ":").as_str())
                    .color(color)
                    .to_string(),
                message
            ))
        })
        .level(cli.log_level)
        .chain(io::stderr())
        .apply()
        .unwrap();

    let mut driver = Driver::new();
    match cli.cmd {
        Command::Check(options) => check::action(&mut driver, options),
        Command::Eval(options) => eval::action(&mut driver, options),
    }

    if driver.errors_emitted != 0 {
        eprintln!(
            "{}",
            format!("exiting with {} error(s)", driver.errors_emitted).red()
        );
        std::process::exit(1);
    }
}
