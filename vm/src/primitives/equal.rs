use heap::Heap;
use object::{Value, bool_value};

/// Structural equality as a builtin boolean.
pub fn equal(heap: &Heap, a: Value, b: Value) -> Value {
    bool_value(values_equal(heap, a, b))
}

/// Structural equality.
///
/// Immediates compare by word. Boxed values are equal when their blocks have
/// the same shape, identical raw words (header, closure entry and arity) and
/// pairwise equal fields. Walks an explicit worklist.
pub fn values_equal(heap: &Heap, a: Value, b: Value) -> bool {
    let mut work = vec![(a, b)];
    while let Some((a, b)) = work.pop() {
        if a == b {
            continue;
        }
        let (Some(ra), Some(rb)) = (a.as_obj_ref(), b.as_obj_ref()) else {
            return false;
        };
        if ra.is_pair() != rb.is_pair() {
            return false;
        }
        let (wa, wb) = (heap.block(ra), heap.block(rb));
        if wa.len() != wb.len() {
            return false;
        }
        let traced = heap.traced_range(ra);
        if wa[..traced.start] != wb[..traced.start] {
            return false;
        }
        for i in traced {
            work.push((Value::from_raw(wa[i]), Value::from_raw(wb[i])));
        }
    }
    true
}
