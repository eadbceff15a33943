#[macro_use]
mod macros;

mod ast;
mod cli;
mod driver;
mod errors;
#[macro_use]
mod typing;
mod utils;

fn main() {
    cli::run();
}
