use crate::driver::{Driver, EvalOptions};

pub(super) fn action(driver: &mut Driver, options: EvalOptions) {
    match driver.eval(&options) {
        Ok(Some(value)) => println!("{}", value),
        Ok(None) => log::warn!("expression did not evaluate to a value"),
        Err(errs) => driver.emit_errors(errs),
    }
}
