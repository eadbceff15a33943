use crate::driver::{type_errors, CheckOptions, Driver};

pub(super) fn action(driver: &mut Driver, options: CheckOptions) {
    match driver.check(&options) {
        Ok(checked) => {
            if checked.messages.is_empty() {
                println!("{}", checked.typed.meta.implicit_ty);
            } else {
                driver.emit_errors(type_errors(checked.messages));
            }
        }
        Err(errs) => driver.emit_errors(errs),
    }
}
