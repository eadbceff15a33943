use std::fs;
use std::path::PathBuf;

use itertools::Itertools;
use structopt::StructOpt;

use crate::ast::Expression;
use crate::errors::{MicaError, MicaErrorKind, MicaResult};
use crate::typing::{evaluate_expression, type_check, Scope, TypedExpression, Value};

#[derive(Debug, StructOpt)]
pub struct CheckOptions {
    #[structopt(name = "INPUT", help = "serialized expression file to check")]
    pub input_path: PathBuf,

    #[structopt(long = "print-ast", help = "Print the expression after loading")]
    pub print_ast: bool,
}

#[derive(Debug, StructOpt)]
pub struct EvalOptions {
    #[structopt(name = "INPUT", help = "serialized expression file to evaluate")]
    pub input_path: PathBuf,
}

/// Result of checking one input file: the diagnostics and the typed tree,
/// whose shape already includes any resolved implicit arguments.
pub struct CheckedProgram {
    pub messages: Vec<String>,
    pub typed: TypedExpression,
}

#[derive(Debug)]
pub struct Driver {
    pub errors_emitted: usize,
}

impl Driver {
    pub fn new() -> Driver {
        Driver { errors_emitted: 0 }
    }

    pub fn emit_errors(&mut self, errs: Vec<MicaError>) {
        // identical messages from separate nodes collapse into one report
        for (kind, group) in &errs.into_iter().group_by(|err| err.kind) {
            let msgs = group.map(|err| err.msg).unique().collect::<Vec<_>>();
            for msg in msgs {
                MicaError { msg, kind }.emit();
                self.errors_emitted += 1;
            }
        }
    }

    pub fn load_expression(&self, path: &PathBuf) -> MicaResult<Expression> {
        let file = fs::File::open(path)?;
        let expr = bincode::deserialize_from(file)?;
        Ok(expr)
    }

    pub fn check(&self, options: &CheckOptions) -> Result<CheckedProgram, Vec<MicaError>> {
        let expr = self.load_expression(&options.input_path)?;
        if options.print_ast {
            eprintln!("{}", expr);
        }

        log::info!("type checking {}...", options.input_path.display());
        let (messages, typed) = type_check(&expr)?;
        Ok(CheckedProgram { messages, typed })
    }

    pub fn eval(&self, options: &EvalOptions) -> Result<Option<Value>, Vec<MicaError>> {
        let checked = self.check(&CheckOptions {
            input_path: options.input_path.clone(),
            print_ast: false,
        })?;
        if !checked.messages.is_empty() {
            return Err(type_errors(checked.messages));
        }

        log::info!("evaluating {}...", options.input_path.display());
        let value = evaluate_expression(&Scope::new(), &checked.typed.strip())?;
        Ok(value)
    }
}

pub fn type_errors(messages: Vec<String>) -> Vec<MicaError> {
    messages
        .into_iter()
        .map(|msg| MicaError {
            msg,
            kind: MicaErrorKind::Type,
        })
        .collect()
}
