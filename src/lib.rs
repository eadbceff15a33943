#[macro_use]
pub mod macros;

pub mod ast;
pub mod cli;
pub mod driver;
pub mod errors;
#[macro_use]
pub mod typing;
pub mod utils;
