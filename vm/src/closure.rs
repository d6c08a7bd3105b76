//! Closure application.
//!
//! For a closure of arity `nargs` holding `c` captured arguments applied to
//! `k` more:
//!
//! - `c + k == nargs`: call the entry with captured ++ supplied.
//! - `c + k < nargs`: build an extended closure and deliver it to the
//!   continuation.
//! - `c + k > nargs`: leave the surplus in a pending block
//!   `[continuation][rest…][count]`, make the saturated call with
//!   continuation [`Label::APPLY_PENDING`], and apply the rest to its result.

use std::cmp::Ordering;

use object::{SWord, Value, layout::closure_words};

use crate::{
    Machine, RuntimeError,
    alloc::{ClosureView, extend_block},
    program::Label,
    rt_assert,
};

impl Machine {
    /// Call a closure known to be saturated by `args`.
    pub fn call_closure(
        &mut self,
        cl: Value,
        args: &[Value],
        ret: Label,
    ) -> Result<Label, RuntimeError> {
        let view = self.closure_view(cl)?;
        rt_assert!(view.captured() + args.len() == view.nargs, "saturated closure call");
        self.push_frame(ret, view.nargs)?;
        self.push_saturated(&view, args);
        Ok(view.entry)
    }

    /// Tail-call a closure known to be saturated by `args`.
    pub fn tail_call_closure(
        &mut self,
        cl: Value,
        args: &[Value],
    ) -> Result<Label, RuntimeError> {
        let view = self.closure_view(cl)?;
        rt_assert!(view.captured() + args.len() == view.nargs, "saturated closure call");
        self.stack.truncate(self.fp);
        self.check_stack(view.nargs)?;
        self.push_saturated(&view, args);
        Ok(view.entry)
    }

    /// Apply `cl` to any number of arguments; `ret` receives the result.
    pub fn call_closures(
        &mut self,
        cl: Value,
        args: &[Value],
        ret: Label,
    ) -> Result<Label, RuntimeError> {
        let view = self.closure_view(cl)?;
        match (view.captured() + args.len()).cmp(&view.nargs) {
            Ordering::Equal => {
                self.push_frame(ret, view.nargs)?;
                self.push_saturated(&view, args);
                Ok(view.entry)
            }
            Ordering::Less => {
                self.result = self.extend_saving(cl, args)?;
                Ok(ret)
            }
            Ordering::Greater => self.over_apply(&view, args, ret),
        }
    }

    /// Apply `cl` to any number of arguments in tail position.
    pub fn tail_call_closures(
        &mut self,
        cl: Value,
        args: &[Value],
    ) -> Result<Label, RuntimeError> {
        let view = self.closure_view(cl)?;
        match (view.captured() + args.len()).cmp(&view.nargs) {
            Ordering::Equal => {
                self.stack.truncate(self.fp);
                self.check_stack(view.nargs)?;
                self.push_saturated(&view, args);
                Ok(view.entry)
            }
            Ordering::Less => {
                let extended = self.extend_saving(cl, args)?;
                Ok(self.ret(extended))
            }
            Ordering::Greater => {
                let cont = self.leave_frame();
                self.over_apply(&view, args, cont)
            }
        }
    }

    fn push_saturated(&mut self, view: &ClosureView, args: &[Value]) {
        for i in 0..view.captured() {
            let v = self.captured(view, i);
            self.stack.push(v);
        }
        for &arg in args {
            self.stack.push(arg);
        }
    }

    fn over_apply(
        &mut self,
        view: &ClosureView,
        args: &[Value],
        ret: Label,
    ) -> Result<Label, RuntimeError> {
        let need = view.nargs - view.captured();
        let (now, rest) = args.split_at(need);

        self.check_stack(rest.len() + 2)?;
        self.stack.push(Value::code_address(ret.id()));
        for &arg in rest {
            self.stack.push(arg);
        }
        self.stack.push(Value::smallint(rest.len() as SWord));

        self.push_frame(Label::APPLY_PENDING, view.nargs)?;
        self.push_saturated(view, now);
        Ok(view.entry)
    }

    /// Continuation of a saturated call made by an over-application: pop the
    /// pending block and apply its arguments to the result.
    pub(crate) fn apply_pending(&mut self) -> Result<Label, RuntimeError> {
        let top = self.stack.depth();
        let count = self.stack.get(top - 1).smallint_value() as usize;
        let base = top - 2 - count;
        let cont = Label::from_id(self.stack.get(base).as_code_address());
        let rest = self.stack.as_slice()[base + 1..base + 1 + count].to_vec();
        self.stack.truncate(base);
        let f = self.result;
        self.call_closures(f, &rest, cont)
    }

    /// Build `cl` extended by `args` at a checkpoint of its own. The closure
    /// and arguments ride on the stack across the reservation.
    fn extend_saving(&mut self, cl: Value, args: &[Value]) -> Result<Value, RuntimeError> {
        if args.is_empty() {
            return Ok(cl);
        }
        let captured = self.closure_view(cl)?.captured();
        let base = self.stack.depth();
        self.check_stack(1 + args.len())?;
        self.stack.push(cl);
        for &arg in args {
            self.stack.push(arg);
        }

        self.prealloc(closure_words(captured + args.len()))?;

        let view = self.closure_view(self.stack.get(base))?;
        let extended = extend_block(&mut self.heap, &view, &self.stack.as_slice()[base + 1..]);
        self.stack.truncate(base);
        Ok(extended)
    }
}
