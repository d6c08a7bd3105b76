//! Builtin operations on tagged values.

use object::{FALSE, TRUE, Value};

pub mod equal;
pub mod fixnum;

pub use equal::{equal, values_equal};

/// Interpret a builtin boolean. Anything else is an invariant violation.
#[inline(always)]
pub fn is_true(v: Value) -> bool {
    debug_assert!(v == TRUE || v == FALSE, "not a boolean: {v:?}");
    v == TRUE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans() {
        assert!(is_true(TRUE));
        assert!(!is_true(FALSE));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "not a boolean")]
    fn non_boolean_is_rejected() {
        is_true(object::make_smallint(1));
    }
}
