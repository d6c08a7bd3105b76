//! Value printing and the sinks that receive printed values.

use std::{fmt::Write as _, sync::Arc};

use heap::Heap;
use object::{
    Header, ObjectKind, Unpacked, Value,
    layout::{CLOSURE_ARGS_OFFSET, CLOSURE_NARGS_OFFSET, CONSTR_FIELDS_OFFSET, PAIR_FST, PAIR_SND},
};
use parking_lot::Mutex;

use crate::program::Names;

/// Nesting beyond this depth is printed as `...`.
pub const MAX_RENDER_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedKind {
    Toplevel,
    Trace,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observed {
    pub kind: ObservedKind,
    pub value: Value,
    pub text: String,
}

pub trait OutputSink {
    fn print(&mut self, kind: ObservedKind, value: Value, text: &str);

    /// The final value of a program.
    fn print_toplevel(&mut self, value: Value, text: &str) {
        self.print(ObservedKind::Toplevel, value, text);
    }
}

/// Prints results to stdout and traces to stderr.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn print(&mut self, kind: ObservedKind, _value: Value, text: &str) {
        match kind {
            ObservedKind::Toplevel => println!("{text}"),
            ObservedKind::Trace => eprintln!("trace: {text}"),
            ObservedKind::Failure => eprintln!("failure: {text}"),
        }
    }
}

/// Drops everything printed.
#[derive(Debug, Default)]
pub struct DiscardSink;

impl OutputSink for DiscardSink {
    fn print(&mut self, _kind: ObservedKind, _value: Value, _text: &str) {}
}

/// Records everything printed. Clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectSink {
    seen: Arc<Mutex<Vec<Observed>>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observed(&self) -> Vec<Observed> {
        self.seen.lock().clone()
    }

    /// Text of the last top-level value, if a program finished.
    pub fn toplevel(&self) -> Option<String> {
        self.seen
            .lock()
            .iter()
            .rev()
            .find(|o| o.kind == ObservedKind::Toplevel)
            .map(|o| o.text.clone())
    }
}

impl OutputSink for CollectSink {
    fn print(&mut self, kind: ObservedKind, value: Value, text: &str) {
        self.seen.lock().push(Observed {
            kind,
            value,
            text: text.to_string(),
        });
    }
}

// ── Rendering ─────────────────────────────────────────────────────────

/// Render a value: integers in decimal, constructors by name with their
/// fields, pairs as tuples, closures by function name and arity.
pub fn render(heap: &Heap, names: &Names, value: Value) -> String {
    let mut out = String::new();
    render_into(&mut out, heap, names, value, 0);
    out
}

fn constr_name(out: &mut String, names: &Names, header: Header) {
    match names.constr(header.uid()) {
        Some(name) => out.push_str(name),
        None => {
            let _ = write!(out, "c{}", header.uid());
        }
    }
}

fn render_into(out: &mut String, heap: &Heap, names: &Names, value: Value, depth: usize) {
    if depth > MAX_RENDER_DEPTH {
        out.push_str("...");
        return;
    }
    match value.unpack() {
        Unpacked::SmallInt(n) => {
            let _ = write!(out, "{n}");
        }
        Unpacked::Unboxed(header) => constr_name(out, names, header),
        Unpacked::Boxed(r) if r.is_pair() => {
            out.push('(');
            render_into(out, heap, names, heap.load(r, PAIR_FST), depth + 1);
            out.push_str(", ");
            render_into(out, heap, names, heap.load(r, PAIR_SND), depth + 1);
            out.push(')');
        }
        Unpacked::Boxed(r) => {
            let header = heap.get_header(r);
            match header.kind() {
                ObjectKind::Constr => {
                    constr_name(out, names, header);
                    if header.nfields() > 0 {
                        out.push('(');
                        for i in 0..header.nfields() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            let field = heap.load(r, CONSTR_FIELDS_OFFSET + i);
                            render_into(out, heap, names, field, depth + 1);
                        }
                        out.push(')');
                    }
                }
                ObjectKind::Closure => {
                    let nargs = heap.word(r.offset() + CLOSURE_NARGS_OFFSET);
                    out.push_str("<closure ");
                    match names.function(header.uid()) {
                        Some(name) => out.push_str(name),
                        None => {
                            let _ = write!(out, "f{}", header.uid());
                        }
                    }
                    let _ = write!(out, "/{nargs}+{}", header.nfields());
                    for i in 0..header.nfields() {
                        out.push(' ');
                        let captured = heap.load(r, CLOSURE_ARGS_OFFSET + i);
                        render_into(out, heap, names, captured, depth + 1);
                    }
                    out.push('>');
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heap::{HeapSettings, RootProvider};
    use object::{FALSE, ObjRef, TRUE, make_header, make_smallint};

    struct NoRoots;

    impl RootProvider for NoRoots {
        fn visit_roots(&mut self, _visitor: &mut dyn FnMut(&mut Value)) {}
    }

    fn heap() -> Heap {
        let mut heap = Heap::new(HeapSettings::default());
        heap.reserve(64, &mut NoRoots).unwrap();
        heap
    }

    #[test]
    fn renders_immediates() {
        let heap = heap();
        let names = Names::default();
        assert_eq!(render(&heap, &names, make_smallint(789)), "789");
        assert_eq!(render(&heap, &names, make_smallint(-3)), "-3");
        assert_eq!(render(&heap, &names, TRUE), "True");
        assert_eq!(render(&heap, &names, FALSE), "False");
        assert_eq!(
            render(&heap, &names, Value::unboxed(make_header(99, 0))),
            "c99"
        );
    }

    #[test]
    fn renders_constructors_and_pairs() {
        let mut heap = heap();
        let names = Names::default();
        let fresh = heap.bump_alloc(3);
        fresh.words[0] = make_header(40, 2).raw();
        fresh.words[1] = make_smallint(1).raw();
        fresh.words[2] = TRUE.raw();
        let constr = Value::boxed(ObjRef::object(fresh.offset));

        let fresh = heap.bump_alloc(2);
        fresh.words[0] = constr.raw();
        fresh.words[1] = make_smallint(2).raw();
        let pair = Value::boxed(ObjRef::pair(fresh.offset));

        assert_eq!(render(&heap, &names, pair), "(c40(1, True), 2)");
    }

    #[test]
    fn deep_values_are_truncated() {
        let mut heap = heap();
        let names = Names::default();
        heap.reserve(2 * (MAX_RENDER_DEPTH + 5), &mut NoRoots).unwrap();
        let mut v = make_smallint(0);
        for _ in 0..MAX_RENDER_DEPTH + 5 {
            let fresh = heap.bump_alloc(2);
            fresh.words[0] = v.raw();
            fresh.words[1] = object::UNIT.raw();
            v = Value::boxed(ObjRef::pair(fresh.offset));
        }
        let text = render(&heap, &names, v);
        assert!(text.contains("..."));
        assert!(!text.contains('0'));
    }

    #[test]
    fn collect_sink_shares_buffer() {
        let sink = CollectSink::new();
        let mut writer = sink.clone();
        writer.print_toplevel(make_smallint(1), "1");
        writer.print(ObservedKind::Trace, make_smallint(2), "2");
        assert_eq!(sink.observed().len(), 2);
        assert_eq!(sink.toplevel().as_deref(), Some("1"));
    }
}
