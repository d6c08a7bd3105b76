use std::sync::Arc;

use heap::{Heap, HeapSettings, RootProvider};
use object::{SMALLINT_MAX, SWord, UNIT, Value};

use crate::{
    OutputSink, RuntimeError,
    output::{self, ObservedKind},
    program::{Label, Names, Program},
    rt_assert,
    stack::Stack,
};

/// Continuation and saved frame pointer sit below the first argument.
pub const FRAME_HEADER_WORDS: usize = 2;

#[derive(Debug, Clone)]
pub struct MachineSettings {
    pub heap: HeapSettings,
    /// Hard limit on the explicit stack, in words.
    pub max_stack_words: usize,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            heap: HeapSettings::default(),
            max_stack_words: 1 << 20,
        }
    }
}

impl MachineSettings {
    pub fn validate(&self) -> Result<(), &'static str> {
        self.heap.validate()?;
        if self.max_stack_words < 16 {
            return Err("max_stack_words must be >= 16");
        }
        if self.max_stack_words > SMALLINT_MAX as usize {
            return Err("max_stack_words does not fit a frame link");
        }
        Ok(())
    }
}

/// The roots of a collection: every stack slot plus the result register.
pub(crate) struct MachineRoots<'a> {
    stack: &'a mut Stack,
    result: &'a mut Value,
}

impl RootProvider for MachineRoots<'_> {
    fn visit_roots(&mut self, visitor: &mut dyn FnMut(&mut Value)) {
        visitor(self.result);
        for slot in self.stack.as_mut_slice() {
            visitor(slot);
        }
    }
}

/// Interpreter state: stack, frame pointer, heap and result register.
///
/// Frame layout, growing upward:
///
/// ```text
/// [ continuation ][ link (saved fp) ][ arg 0 … arg n-1 ][ temporaries … ]
///                                      ^ fp
/// ```
pub struct Machine {
    pub(crate) heap: Heap,
    pub(crate) stack: Stack,
    pub(crate) fp: usize,
    pub(crate) result: Value,
    pub(crate) names: Arc<Names>,
    sink: Box<dyn OutputSink>,
    max_stack_words: usize,
    steps: u64,
}

impl Machine {
    pub fn new(settings: MachineSettings, sink: Box<dyn OutputSink>) -> Self {
        settings.validate().expect("Invalid Machine Settings");
        Self {
            heap: Heap::new(settings.heap),
            stack: Stack::with_capacity(1024.min(settings.max_stack_words)),
            fp: 0,
            result: UNIT,
            names: Arc::new(Names::default()),
            sink,
            max_stack_words: settings.max_stack_words,
            steps: 0,
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn names(&self) -> &Names {
        &self.names
    }

    /// Labels executed by the last [`Machine::run`].
    pub fn steps(&self) -> u64 {
        self.steps
    }

    // ── Frame access ──────────────────────────────────────────────────

    /// Argument `i` of the current frame.
    #[inline(always)]
    pub fn arg(&self, i: usize) -> Value {
        self.local(i)
    }

    /// Slot `i` of the current frame, counting arguments then temporaries.
    #[inline(always)]
    pub fn local(&self, i: usize) -> Value {
        debug_assert!(self.fp + i < self.stack.depth(), "frame slot {i} out of range");
        self.stack.get(self.fp + i)
    }

    #[inline(always)]
    pub fn set_local(&mut self, i: usize, value: Value) {
        debug_assert!(self.fp + i < self.stack.depth(), "frame slot {i} out of range");
        self.stack.set(self.fp + i, value);
    }

    /// Push a temporary onto the current frame.
    #[inline(always)]
    pub fn push_local(&mut self, value: Value) -> Result<(), RuntimeError> {
        self.check_stack(1)?;
        self.stack.push(value);
        Ok(())
    }

    /// Number of slots in the current frame.
    #[inline(always)]
    pub fn frame_len(&self) -> usize {
        self.stack.depth() - self.fp
    }

    /// The value delivered by the last return.
    #[inline(always)]
    pub fn result(&self) -> Value {
        self.result
    }

    #[inline(always)]
    pub(crate) fn check_stack(&self, words: usize) -> Result<(), RuntimeError> {
        if self.stack.depth() + words > self.max_stack_words {
            return Err(RuntimeError::StackOverflow {
                limit: self.max_stack_words,
            });
        }
        Ok(())
    }

    // ── Calling convention ────────────────────────────────────────────

    /// Open a frame for `callee` above the current one. `ret` runs when the
    /// callee returns.
    #[inline]
    pub fn call(
        &mut self,
        callee: Label,
        args: &[Value],
        ret: Label,
    ) -> Result<Label, RuntimeError> {
        self.push_frame(ret, args.len())?;
        for &arg in args {
            self.stack.push(arg);
        }
        Ok(callee)
    }

    /// Replace the current frame with one for `callee`, keeping the caller's
    /// continuation.
    #[inline]
    pub fn tail_call(
        &mut self,
        callee: Label,
        args: &[Value],
    ) -> Result<Label, RuntimeError> {
        self.stack.truncate(self.fp);
        self.check_stack(args.len())?;
        for &arg in args {
            self.stack.push(arg);
        }
        Ok(callee)
    }

    /// Deliver `value` to the current frame's continuation and pop the frame.
    #[inline]
    pub fn ret(&mut self, value: Value) -> Label {
        self.result = value;
        self.leave_frame()
    }

    /// Push continuation and link; `fp` then points at the first argument.
    #[inline(always)]
    pub(crate) fn push_frame(
        &mut self,
        ret: Label,
        nargs: usize,
    ) -> Result<(), RuntimeError> {
        self.check_stack(FRAME_HEADER_WORDS + nargs)?;
        self.stack.push(Value::code_address(ret.id()));
        self.stack.push(Value::smallint(self.fp as SWord));
        self.fp = self.stack.depth();
        Ok(())
    }

    /// Pop the current frame, returning its continuation.
    #[inline(always)]
    pub(crate) fn leave_frame(&mut self) -> Label {
        let base = self.fp - FRAME_HEADER_WORDS;
        let cont = self.stack.get(base).as_code_address();
        let link = self.stack.get(base + 1).smallint_value() as usize;
        self.stack.truncate(base);
        self.fp = link;
        Label::from_id(cont)
    }

    // ── Control flow ──────────────────────────────────────────────────

    /// Boolean branch on a builtin `True`/`False` value.
    #[inline]
    pub fn branch(
        &self,
        cond: Value,
        if_true: Label,
        if_false: Label,
    ) -> Result<Label, RuntimeError> {
        rt_assert!(cond == object::TRUE || cond == object::FALSE, "branch on a boolean");
        Ok(if cond == object::TRUE { if_true } else { if_false })
    }

    // ── Allocation checkpoints ────────────────────────────────────────

    /// Reserve `words` heap words. The only point where a collection can run.
    #[inline]
    pub fn prealloc(&mut self, words: usize) -> Result<(), RuntimeError> {
        let mut roots = MachineRoots {
            stack: &mut self.stack,
            result: &mut self.result,
        };
        self.heap.reserve(words, &mut roots)?;
        Ok(())
    }

    /// [`Machine::prealloc`] for code holding references outside the stack:
    /// `temps` are spilled before the checkpoint and reloaded after it.
    pub fn prealloc_saving(
        &mut self,
        words: usize,
        temps: &mut [Value],
    ) -> Result<(), RuntimeError> {
        let base = self.stack.depth();
        self.check_stack(temps.len())?;
        for &t in temps.iter() {
            self.stack.push(t);
        }
        let reserved = self.prealloc(words);
        for (i, t) in temps.iter_mut().enumerate() {
            *t = self.stack.get(base + i);
        }
        self.stack.truncate(base);
        reserved
    }

    // ── I/O ───────────────────────────────────────────────────────────

    pub fn render(&self, value: Value) -> String {
        output::render(&self.heap, &self.names, value)
    }

    /// Print `value` through the sink and carry on.
    pub fn trace(&mut self, value: Value) {
        let text = self.render(value);
        self.sink.print(ObservedKind::Trace, value, &text);
    }

    /// Print `value` through the sink and produce the fatal failure error.
    pub fn failure(&mut self, value: Value) -> RuntimeError {
        let text = self.render(value);
        self.sink.print(ObservedKind::Failure, value, &text);
        RuntimeError::Failure { message: text }
    }

    /// Log the live stack, top first.
    pub fn dump_stack(&self) {
        log::debug!("stack: depth {}, fp {}", self.stack.depth(), self.fp);
        for (i, v) in self.stack.as_slice().iter().enumerate().rev() {
            let marker = if i == self.fp { "<- fp" } else { "" };
            log::debug!("  [{i:4}] {v:?} {marker}");
        }
    }

    // ── Run loop ──────────────────────────────────────────────────────

    #[inline(always)]
    fn step(&mut self, program: &Program, label: Label) -> Result<Label, RuntimeError> {
        if label == Label::APPLY_PENDING {
            return self.apply_pending();
        }
        let (max_alloc, code) = program.code(label);
        log::trace!("jump {}", program.label_name(label));
        if max_alloc > 0 {
            self.prealloc(max_alloc)?;
        }
        code(self)
    }

    /// Execute `program` from its entry label until the end continuation,
    /// handing the final value to the sink.
    pub fn run(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        self.names = Arc::clone(program.names());
        self.stack.clear();
        self.fp = 0;
        self.result = UNIT;
        self.steps = 0;
        log::debug!("run: entry `{}`", program.label_name(program.entry()));

        let mut label = self.call(program.entry(), &[], Label::PROGRAM_END)?;
        while label != Label::PROGRAM_END {
            self.steps += 1;
            label = match self.step(program, label) {
                Ok(next) => next,
                Err(err) => {
                    log::debug!("run: {} at `{}`", err, program.label_name(label));
                    if log::log_enabled!(log::Level::Debug) {
                        self.dump_stack();
                    }
                    return Err(err);
                }
            };
        }

        let value = self.result;
        debug_assert_eq!(self.stack.depth(), 0, "stack not empty at program end");
        log::debug!(
            "run: finished after {} steps, stack high water {}, {} collections",
            self.steps,
            self.stack.high_water(),
            self.heap.stats().collections
        );
        let text = self.render(value);
        self.sink.print_toplevel(value, &text);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CollectSink, ProgramBuilder};
    use object::make_smallint;

    fn machine() -> (Machine, CollectSink) {
        let sink = CollectSink::new();
        let m = Machine::new(MachineSettings::default(), Box::new(sink.clone()));
        (m, sink)
    }

    // ── Settings ──────────────────────────────────────────────────────

    #[test]
    fn settings_validate() {
        assert!(MachineSettings::default().validate().is_ok());
        let tiny = MachineSettings {
            max_stack_words: 4,
            ..MachineSettings::default()
        };
        assert!(tiny.validate().is_err());
        let links_fit = MachineSettings {
            max_stack_words: SMALLINT_MAX as usize,
            heap: HeapSettings::default(),
        };
        assert!(links_fit.validate().is_ok());
        let links_overflow = MachineSettings {
            max_stack_words: SMALLINT_MAX as usize + 1,
            ..MachineSettings::default()
        };
        assert_eq!(
            links_overflow.validate(),
            Err("max_stack_words does not fit a frame link")
        );
    }

    // ── Frames ────────────────────────────────────────────────────────

    #[test]
    fn call_and_ret_restore_the_caller_frame() {
        let (mut m, _) = machine();
        let mut b = ProgramBuilder::new();
        let callee = b.label("callee");
        let k = b.label("k");

        m.push_frame(Label::PROGRAM_END, 1).unwrap();
        m.stack.push(make_smallint(5));
        let caller_fp = m.fp;

        let next = m.call(callee, &[make_smallint(1), make_smallint(2)], k).unwrap();
        assert_eq!(next, callee);
        assert_eq!(m.arg(0), make_smallint(1));
        assert_eq!(m.arg(1), make_smallint(2));
        assert_eq!(m.frame_len(), 2);

        let cont = m.ret(make_smallint(3));
        assert_eq!(cont, k);
        assert_eq!(m.fp, caller_fp);
        assert_eq!(m.result(), make_smallint(3));
        assert_eq!(m.arg(0), make_smallint(5));
        assert_eq!(m.stack.depth(), 3);
    }

    #[test]
    fn tail_call_reuses_the_frame() {
        let (mut m, _) = machine();
        let mut b = ProgramBuilder::new();
        let f = b.label("f");
        let k = b.label("k");

        m.call(f, &[make_smallint(1)], k).unwrap();
        m.push_local(make_smallint(9)).unwrap();
        let depth = m.stack.depth();

        m.tail_call(f, &[make_smallint(2)]).unwrap();
        assert_eq!(m.stack.depth(), depth - 1);
        assert_eq!(m.arg(0), make_smallint(2));
        assert_eq!(m.ret(UNIT), k);
        assert_eq!(m.stack.depth(), 0);
    }

    #[test]
    fn call_beyond_limit_overflows() {
        let sink = CollectSink::new();
        let mut m = Machine::new(
            MachineSettings {
                max_stack_words: 16,
                ..MachineSettings::default()
            },
            Box::new(sink),
        );
        let mut b = ProgramBuilder::new();
        let f = b.label("f");
        let mut result = Ok(f);
        for _ in 0..16 {
            result = m.call(f, &[UNIT, UNIT], f);
            if result.is_err() {
                break;
            }
        }
        assert_eq!(result, Err(RuntimeError::StackOverflow { limit: 16 }));
    }

    // ── Checkpoints ───────────────────────────────────────────────────

    #[test]
    fn prealloc_saving_reloads_moved_references() {
        let sink = CollectSink::new();
        let mut m = Machine::new(
            MachineSettings {
                heap: HeapSettings {
                    initial_words: 8,
                    max_words: 8,
                    grow_threshold: 1.0,
                },
                ..MachineSettings::default()
            },
            Box::new(sink),
        );
        m.prealloc(8).unwrap();
        let _garbage = m.make_pair(make_smallint(0), make_smallint(0));
        let live = m.make_pair(make_smallint(1), make_smallint(2));
        let mut temps = [live, make_smallint(7)];

        m.prealloc_saving(6, &mut temps).unwrap();
        assert_eq!(m.heap.stats().collections, 1);
        assert_ne!(temps[0], live);
        assert_eq!(m.fst(temps[0]), make_smallint(1));
        assert_eq!(m.snd(temps[0]), make_smallint(2));
        assert_eq!(temps[1], make_smallint(7));
        assert_eq!(m.stack.depth(), 0);
    }

    #[test]
    fn branch_selects_on_booleans() {
        let (m, _) = machine();
        let mut b = ProgramBuilder::new();
        let t = b.label("t");
        let f = b.label("f");
        assert_eq!(m.branch(object::TRUE, t, f), Ok(t));
        assert_eq!(m.branch(object::FALSE, t, f), Ok(f));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn branch_on_non_boolean_is_an_assertion() {
        let (m, _) = machine();
        let mut b = ProgramBuilder::new();
        let t = b.label("t");
        assert!(matches!(
            m.branch(make_smallint(1), t, t),
            Err(RuntimeError::AssertionFailed { .. })
        ));
    }

    // ── I/O ───────────────────────────────────────────────────────────

    #[test]
    fn trace_and_failure_reach_the_sink() {
        let (mut m, sink) = machine();
        m.trace(make_smallint(4));
        let err = m.failure(make_smallint(5));
        assert_eq!(
            err,
            RuntimeError::Failure {
                message: "5".into()
            }
        );
        let seen = sink.observed();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, ObservedKind::Trace);
        assert_eq!(seen[1].kind, ObservedKind::Failure);
        assert_eq!(seen[1].text, "5");
    }
}
