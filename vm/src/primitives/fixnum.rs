//! Small-integer arithmetic. Results wrap modulo `2^SMALLINT_BITS`.

use object::{SWord, Value, bool_value};

use crate::RuntimeError;

#[inline(always)]
fn operands(a: Value, b: Value) -> (SWord, SWord) {
    debug_assert!(a.is_smallint(), "arithmetic on {a:?}");
    debug_assert!(b.is_smallint(), "arithmetic on {b:?}");
    (a.smallint_value(), b.smallint_value())
}

#[inline(always)]
pub fn add(a: Value, b: Value) -> Value {
    let (x, y) = operands(a, b);
    Value::smallint_wrapping(x.wrapping_add(y))
}

#[inline(always)]
pub fn sub(a: Value, b: Value) -> Value {
    let (x, y) = operands(a, b);
    Value::smallint_wrapping(x.wrapping_sub(y))
}

#[inline(always)]
pub fn mul(a: Value, b: Value) -> Value {
    let (x, y) = operands(a, b);
    Value::smallint_wrapping(x.wrapping_mul(y))
}

/// Truncating division.
#[inline]
pub fn div(a: Value, b: Value) -> Result<Value, RuntimeError> {
    let (x, y) = operands(a, b);
    if y == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(Value::smallint_wrapping(x.wrapping_div(y)))
}

/// Remainder with the sign of the dividend.
#[inline]
pub fn modulo(a: Value, b: Value) -> Result<Value, RuntimeError> {
    let (x, y) = operands(a, b);
    if y == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(Value::smallint_wrapping(x.wrapping_rem(y)))
}

#[inline(always)]
pub fn lt(a: Value, b: Value) -> Value {
    let (x, y) = operands(a, b);
    bool_value(x < y)
}

#[inline(always)]
pub fn le(a: Value, b: Value) -> Value {
    let (x, y) = operands(a, b);
    bool_value(x <= y)
}
