/// Counter-backed generator of fresh free-variable names. One factory lives
/// for the duration of a compilation and is threaded explicitly through every
/// function that needs fresh names; names are monotonic, so two distinct
/// variables can never collide and silently unify.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameFactory {
    value: u64,
    prefix: &'static str,
}

impl NameFactory {
    pub fn new(prefix: &'static str) -> NameFactory {
        NameFactory { value: 0, prefix }
    }

    pub fn skip_to(&mut self, value: u64) {
        self.value = value;
    }

    pub fn next(&mut self) -> String {
        let v = self.value;
        self.value += 1;
        format!("{}{}", self.prefix, v)
    }
}

impl Default for NameFactory {
    fn default() -> Self {
        NameFactory::new("$v")
    }
}
