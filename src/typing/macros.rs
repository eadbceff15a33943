#[macro_export]
macro_rules! fvar {
    ($v:tt) => {
        $crate::typing::value::Value::free_variable(stringify!($v))
    };
}

#[macro_export]
macro_rules! num {
    ($n:expr) => {
        $crate::typing::value::Value::number($n as f64)
    };
}

#[macro_export]
macro_rules! sym {
    ($s:tt) => {
        $crate::typing::value::Value::symbol(stringify!($s))
    };
}

#[macro_export]
macro_rules! dval {
    ($name:tt) => {
        $crate::typing::value::Value::data_named(stringify!($name), vec![])
    };

    ($name:tt, $($p:expr),+ $(,)?) => {
        $crate::typing::value::Value::data_named(stringify!($name), vec![$($p),+])
    };
}

#[macro_export]
macro_rules! rec {
    { $($k:ident : $v:expr),* $(,)? } => {
        $crate::typing::value::Value::record(vec![
            $((stringify!($k).to_string(), $v)),*
        ])
    };
}

#[macro_export]
macro_rules! repl {
    () => {
        $crate::typing::subst::Replacements::new()
    };

    ( $( $from:tt => $to:expr ),+ $(,)? ) => {
        $crate::typing::subst::Replacements::from(vec![
            $($crate::typing::subst::VariableReplacement::new(stringify!($from), $to)),+
        ])
    };
}
