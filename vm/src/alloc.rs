//! Object construction and field access.
//!
//! Every constructor here bump-allocates and therefore must run inside a
//! reservation made by a checkpoint ([`Machine::prealloc`] or a binding's
//! `max_alloc`).

use heap::Heap;
use object::{
    Header, ObjRef, Value, Word,
    layout::{
        CLOSURE_ARGS_OFFSET, CLOSURE_ENTRY_OFFSET, CLOSURE_NARGS_OFFSET, CONSTR_FIELDS_OFFSET,
        PAIR_FST, PAIR_SND, PAIR_WORDS, closure_words, constr_words,
    },
};

use crate::{
    Machine, RuntimeError,
    program::{ConstrRef, FunctionRef, Label, Repr},
};

/// Decoded closure block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosureView {
    pub obj: ObjRef,
    pub header: Header,
    pub entry: Label,
    pub nargs: usize,
}

impl ClosureView {
    #[inline(always)]
    pub fn captured(&self) -> usize {
        self.header.nfields()
    }
}

/// Words a constructor value occupies on the heap.
pub fn constr_alloc_words(c: ConstrRef) -> usize {
    match c.repr() {
        Repr::Unboxed => 0,
        Repr::Boxed => constr_words(c.nfields()),
    }
}

impl Machine {
    // ── Construction ──────────────────────────────────────────────────

    /// Build a value of constructor `c`.
    pub fn construct(&mut self, c: ConstrRef, fields: &[Value]) -> Value {
        debug_assert_eq!(fields.len(), c.nfields(), "constructor arity");
        match c.repr() {
            Repr::Unboxed => c.unboxed_value(),
            Repr::Boxed => {
                let fresh = self.heap.bump_alloc(constr_words(fields.len()));
                fresh.words[0] = c.header().raw();
                for (slot, field) in fresh.words[CONSTR_FIELDS_OFFSET..].iter_mut().zip(fields) {
                    *slot = field.raw();
                }
                Value::boxed(ObjRef::object(fresh.offset))
            }
        }
    }

    pub fn make_pair(&mut self, fst: Value, snd: Value) -> Value {
        let fresh = self.heap.bump_alloc(PAIR_WORDS);
        fresh.words[PAIR_FST] = fst.raw();
        fresh.words[PAIR_SND] = snd.raw();
        Value::boxed(ObjRef::pair(fresh.offset))
    }

    /// A closure over `f` holding `captured` arguments.
    pub fn make_closure(&mut self, f: FunctionRef, captured: &[Value]) -> Value {
        debug_assert!(captured.len() <= f.arity(), "closure captures too many arguments");
        let fresh = self.heap.bump_alloc(closure_words(captured.len()));
        fresh.words[0] = Header::closure(f.uid(), captured.len()).raw();
        fresh.words[CLOSURE_ENTRY_OFFSET] = f.label().id() as Word;
        fresh.words[CLOSURE_NARGS_OFFSET] = f.arity() as Word;
        for (slot, v) in fresh.words[CLOSURE_ARGS_OFFSET..].iter_mut().zip(captured) {
            *slot = v.raw();
        }
        Value::boxed(ObjRef::object(fresh.offset))
    }

    /// A fresh closure holding the captured arguments of `src` followed by
    /// `args`. `src` is left untouched.
    pub fn extend_closure(&mut self, src: Value, args: &[Value]) -> Result<Value, RuntimeError> {
        let view = self.closure_view(src)?;
        Ok(extend_block(&mut self.heap, &view, args))
    }

    // ── Access ────────────────────────────────────────────────────────

    /// Header of a constructor value, boxed or unboxed.
    pub fn header_of(&self, v: Value) -> Option<Header> {
        match v.as_obj_ref() {
            Some(r) if r.is_pair() => None,
            Some(r) => Some(self.heap.get_header(r)),
            None => v.as_header(),
        }
    }

    /// Field `i` of a boxed constructor.
    #[inline]
    pub fn field(&self, v: Value, i: usize) -> Value {
        let r = expect_ref(v);
        debug_assert!(!r.is_pair(), "field access on a pair");
        debug_assert!(i < self.heap.get_header(r).nfields(), "field {i} out of range");
        self.heap.load(r, CONSTR_FIELDS_OFFSET + i)
    }

    #[inline]
    pub fn fst(&self, v: Value) -> Value {
        let r = expect_ref(v);
        debug_assert!(r.is_pair(), "fst of a non-pair");
        self.heap.load(r, PAIR_FST)
    }

    #[inline]
    pub fn snd(&self, v: Value) -> Value {
        let r = expect_ref(v);
        debug_assert!(r.is_pair(), "snd of a non-pair");
        self.heap.load(r, PAIR_SND)
    }

    /// Decode `v` as a closure. Applying anything else is fatal.
    pub fn closure_view(&self, v: Value) -> Result<ClosureView, RuntimeError> {
        let not_a_closure = RuntimeError::AssertionFailed {
            file: file!(),
            line: line!(),
            condition: "applied value is a closure",
        };
        let Some(obj) = v.as_obj_ref().filter(|r| !r.is_pair()) else {
            return Err(not_a_closure);
        };
        let header = self.heap.get_header(obj);
        if !header.is_closure() {
            return Err(not_a_closure);
        }
        let entry = self.heap.word(obj.offset() + CLOSURE_ENTRY_OFFSET);
        let nargs = self.heap.word(obj.offset() + CLOSURE_NARGS_OFFSET);
        Ok(ClosureView {
            obj,
            header,
            entry: Label::from_id(entry as u32),
            nargs: nargs as usize,
        })
    }

    /// Captured argument `i` of a closure.
    #[inline(always)]
    pub(crate) fn captured(&self, view: &ClosureView, i: usize) -> Value {
        self.heap.load(view.obj, CLOSURE_ARGS_OFFSET + i)
    }
}

/// Copy the closure `view` into a fresh block with `args` appended.
pub(crate) fn extend_block(heap: &mut Heap, view: &ClosureView, args: &[Value]) -> Value {
    let captured = view.captured() + args.len();
    let fresh = heap.bump_alloc_copying(
        closure_words(captured),
        view.obj,
        closure_words(view.captured()),
    );
    fresh.words[0] = Header::closure(view.header.uid(), captured).raw();
    let tail = CLOSURE_ARGS_OFFSET + view.captured();
    for (slot, v) in fresh.words[tail..].iter_mut().zip(args) {
        *slot = v.raw();
    }
    Value::boxed(ObjRef::object(fresh.offset))
}

#[inline(always)]
fn expect_ref(v: Value) -> ObjRef {
    match v.as_obj_ref() {
        Some(r) => r,
        None => panic!("expected a heap reference, got {v:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CollectSink, MachineSettings, ProgramBuilder};
    use object::{TRUE, make_smallint};

    fn machine() -> Machine {
        let mut m = Machine::new(MachineSettings::default(), Box::new(CollectSink::new()));
        m.prealloc(256).unwrap();
        m
    }

    #[test]
    fn boxed_constructor_fields() {
        let mut m = machine();
        let mut b = ProgramBuilder::new();
        let cons = b.constructor("Cons", 2, Repr::Boxed).unwrap();
        let v = m.construct(cons, &[make_smallint(1), TRUE]);
        assert!(v.is_ref());
        assert_eq!(m.header_of(v), Some(cons.header()));
        assert_eq!(m.field(v, 0), make_smallint(1));
        assert_eq!(m.field(v, 1), TRUE);
    }

    #[test]
    fn nullary_constructors() {
        let mut m = machine();
        let mut b = ProgramBuilder::new();
        let nil = b.constructor("Nil", 0, Repr::Unboxed).unwrap();
        let tag = b.constructor("Tag", 0, Repr::Boxed).unwrap();

        let hp = m.heap().current_heap_pointer();
        let unboxed = m.construct(nil, &[]);
        assert!(unboxed.is_header());
        assert_eq!(m.heap().current_heap_pointer(), hp);

        let boxed = m.construct(tag, &[]);
        assert!(boxed.is_ref());
        assert_eq!(m.heap().current_heap_pointer(), hp + 1);
        assert_eq!(m.header_of(boxed).map(|h| h.uid()), Some(tag.uid()));
        assert_eq!(constr_alloc_words(nil), 0);
        assert_eq!(constr_alloc_words(tag), 1);
    }

    #[test]
    fn pairs_have_no_header() {
        let mut m = machine();
        let p = m.make_pair(make_smallint(1), make_smallint(2));
        assert_eq!(m.fst(p), make_smallint(1));
        assert_eq!(m.snd(p), make_smallint(2));
        assert_eq!(m.header_of(p), None);
        assert_eq!(m.heap().block(p.as_obj_ref().unwrap()).len(), 2);
    }

    #[test]
    fn extension_does_not_mutate_source() {
        let mut m = machine();
        let mut b = ProgramBuilder::new();
        let f = b.function("f", 3, 0).unwrap();

        let c0 = m.make_closure(f, &[make_smallint(1)]);
        let c1 = m.extend_closure(c0, &[make_smallint(2)]).unwrap();
        let c2 = m.extend_closure(c0, &[make_smallint(5)]).unwrap();

        let v0 = m.closure_view(c0).unwrap();
        let v1 = m.closure_view(c1).unwrap();
        let v2 = m.closure_view(c2).unwrap();
        assert_eq!(v0.captured(), 1);
        assert_eq!(v1.captured(), 2);
        assert_eq!(v1.header.uid(), f.uid());
        assert_eq!(v1.entry, f.label());
        assert_eq!(v1.nargs, 3);
        assert_eq!(m.captured(&v1, 0), make_smallint(1));
        assert_eq!(m.captured(&v1, 1), make_smallint(2));
        assert_eq!(m.captured(&v2, 1), make_smallint(5));
        assert_eq!(m.captured(&v0, 0), make_smallint(1));
    }

    #[test]
    fn closure_view_rejects_other_values() {
        let mut m = machine();
        let p = m.make_pair(TRUE, TRUE);
        assert!(m.closure_view(make_smallint(3)).is_err());
        assert!(m.closure_view(p).is_err());
        assert!(m.closure_view(TRUE).is_err());
    }
}
