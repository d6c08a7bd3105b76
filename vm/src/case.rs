//! Two-tier pattern-match dispatch.
//!
//! Tier 1 switches on the raw value word and covers unboxed constructors and
//! small integers. Its default falls through to tier 2, which switches on the
//! uid in the header of a boxed constructor. Tier 2's default is the fallback
//! arm, or unreachable when the arms are exhaustive.

use heap::Heap;
use object::{SWord, Uid, Value, Word};

use crate::{
    Machine, RuntimeError,
    program::{ConstrRef, ProgramError, Repr},
};

/// How [`CaseDispatch::select`] reached its branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Tier 1 matched the raw word.
    Unboxed,
    /// Tier 2 matched the header uid.
    Boxed,
    /// The only possible branch, taken without a test.
    Elided,
    Fallback,
}

#[derive(Debug, Clone)]
enum Tier<K, B> {
    Skip,
    Elided(B),
    Switch(Vec<(K, B)>),
}

impl<K: Ord + Copy, B: Copy> Tier<K, B> {
    fn compile(mut arms: Vec<(K, B)>, live_default: bool) -> Self {
        match arms.len() {
            0 => Tier::Skip,
            1 if !live_default => Tier::Elided(arms[0].1),
            _ => {
                arms.sort_by_key(|(k, _)| *k);
                Tier::Switch(arms)
            }
        }
    }

    fn arm_count(&self) -> usize {
        match self {
            Tier::Skip => 0,
            Tier::Elided(_) => 1,
            Tier::Switch(arms) => arms.len(),
        }
    }
}

fn lookup<K: Ord + Copy, B: Copy>(arms: &[(K, B)], key: K) -> Option<B> {
    arms.binary_search_by_key(&key, |(k, _)| *k)
        .ok()
        .map(|i| arms[i].1)
}

/// Arms of a case expression, collected before compiling.
#[derive(Debug, Clone)]
pub struct CaseBuilder<B> {
    immediate: Vec<(Word, B)>,
    boxed: Vec<(Uid, B)>,
    fallback: Option<B>,
    duplicate: Option<String>,
}

impl<B: Copy> Default for CaseBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Copy> CaseBuilder<B> {
    pub fn new() -> Self {
        Self {
            immediate: Vec::new(),
            boxed: Vec::new(),
            fallback: None,
            duplicate: None,
        }
    }

    fn add_immediate(mut self, key: Word, branch: B, describe: impl FnOnce() -> String) -> Self {
        if self.immediate.iter().any(|(k, _)| *k == key) {
            self.duplicate.get_or_insert_with(describe);
        } else {
            self.immediate.push((key, branch));
        }
        self
    }

    /// Arm for a constructor; routed to the tier matching its representation.
    pub fn constr(mut self, c: ConstrRef, branch: B) -> Self {
        match c.repr() {
            Repr::Unboxed => {
                let key = c.unboxed_value().raw();
                self.add_immediate(key, branch, || format!("constructor uid {}", c.uid()))
            }
            Repr::Boxed => {
                if self.boxed.iter().any(|(k, _)| *k == c.uid()) {
                    self.duplicate
                        .get_or_insert_with(|| format!("constructor uid {}", c.uid()));
                } else {
                    self.boxed.push((c.uid(), branch));
                }
                self
            }
        }
    }

    /// Arm for a small-integer literal.
    pub fn int(self, n: SWord, branch: B) -> Self {
        let key = Value::smallint(n).raw();
        self.add_immediate(key, branch, || format!("integer {n}"))
    }

    /// Arm taken when no other arm matches.
    pub fn fallback(mut self, branch: B) -> Self {
        if self.fallback.is_some() {
            self.duplicate.get_or_insert_with(|| "fallback".to_string());
        }
        self.fallback = Some(branch);
        self
    }

    pub fn build(self) -> Result<CaseDispatch<B>, ProgramError> {
        if let Some(key) = self.duplicate {
            return Err(ProgramError::DuplicateCase { key });
        }
        let tier2_live = !self.boxed.is_empty() || self.fallback.is_some();
        Ok(CaseDispatch {
            tier1: Tier::compile(self.immediate, tier2_live),
            tier2: Tier::compile(self.boxed, self.fallback.is_some()),
            fallback: self.fallback,
        })
    }
}

/// A compiled case expression.
#[derive(Debug, Clone)]
pub struct CaseDispatch<B> {
    tier1: Tier<Word, B>,
    tier2: Tier<Uid, B>,
    fallback: Option<B>,
}

impl<B: Copy> CaseDispatch<B> {
    pub fn select(&self, heap: &Heap, v: Value) -> Result<(B, Route), RuntimeError> {
        match &self.tier1 {
            Tier::Skip => {}
            Tier::Elided(b) => return Ok((*b, Route::Elided)),
            Tier::Switch(arms) => {
                if let Some(b) = lookup(arms, v.raw()) {
                    return Ok((b, Route::Unboxed));
                }
            }
        }
        match &self.tier2 {
            Tier::Skip => {}
            Tier::Elided(b) => return Ok((*b, Route::Elided)),
            Tier::Switch(arms) => {
                if let Some(r) = v.as_obj_ref().filter(|r| !r.is_pair()) {
                    if let Some(b) = lookup(arms, heap.get_header(r).uid()) {
                        return Ok((b, Route::Boxed));
                    }
                }
            }
        }
        match self.fallback {
            Some(b) => Ok((b, Route::Fallback)),
            None => Err(RuntimeError::UnreachableCase),
        }
    }

    /// Number of arms tested in (tier 1, tier 2).
    pub fn arm_counts(&self) -> (usize, usize) {
        (self.tier1.arm_count(), self.tier2.arm_count())
    }
}

impl Machine {
    /// Branch of `dispatch` for `v`.
    #[inline]
    pub fn select<B: Copy>(&self, dispatch: &CaseDispatch<B>, v: Value) -> Result<B, RuntimeError> {
        let (branch, route) = dispatch.select(&self.heap, v)?;
        log::trace!("case {v:?} -> {route:?}");
        Ok(branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CollectSink, MachineSettings, ProgramBuilder};
    use object::{FALSE, TRUE, make_smallint};

    struct Shapes {
        m: Machine,
        red: ConstrRef,
        green: ConstrRef,
        circle: ConstrRef,
        square: ConstrRef,
    }

    fn shapes() -> Shapes {
        let mut b = ProgramBuilder::new();
        let red = b.constructor("Red", 0, Repr::Unboxed).unwrap();
        let green = b.constructor("Green", 0, Repr::Unboxed).unwrap();
        let circle = b.constructor("Circle", 1, Repr::Boxed).unwrap();
        let square = b.constructor("Square", 2, Repr::Boxed).unwrap();
        let mut m = Machine::new(MachineSettings::default(), Box::new(CollectSink::new()));
        m.prealloc(64).unwrap();
        Shapes {
            m,
            red,
            green,
            circle,
            square,
        }
    }

    #[test]
    fn every_uid_reaches_its_arm_through_the_right_tier() {
        let mut s = shapes();
        let case = CaseBuilder::new()
            .constr(s.red, 1)
            .constr(s.green, 2)
            .constr(s.circle, 3)
            .constr(s.square, 4)
            .build()
            .unwrap();
        assert_eq!(case.arm_counts(), (2, 2));

        let circle = s.m.construct(s.circle, &[make_smallint(5)]);
        let square = s.m.construct(s.square, &[make_smallint(1), make_smallint(2)]);
        let heap = s.m.heap();
        assert_eq!(case.select(heap, s.red.unboxed_value()), Ok((1, Route::Unboxed)));
        assert_eq!(case.select(heap, s.green.unboxed_value()), Ok((2, Route::Unboxed)));
        assert_eq!(case.select(heap, circle), Ok((3, Route::Boxed)));
        assert_eq!(case.select(heap, square), Ok((4, Route::Boxed)));
    }

    #[test]
    fn booleans_dispatch_in_tier_one() {
        let s = shapes();
        let case = CaseBuilder::new()
            .constr(ConstrRef::TRUE, "yes")
            .constr(ConstrRef::FALSE, "no")
            .build()
            .unwrap();
        assert_eq!(case.arm_counts(), (2, 0));
        assert_eq!(case.select(s.m.heap(), TRUE), Ok(("yes", Route::Unboxed)));
        assert_eq!(case.select(s.m.heap(), FALSE), Ok(("no", Route::Unboxed)));
    }

    #[test]
    fn single_boxed_arm_is_elided() {
        let mut s = shapes();
        let case = CaseBuilder::new().constr(s.square, 'q').build().unwrap();
        let square = s.m.construct(s.square, &[make_smallint(1), make_smallint(2)]);
        assert_eq!(case.select(s.m.heap(), square), Ok(('q', Route::Elided)));
    }

    #[test]
    fn single_unboxed_arm_with_live_tier_two_is_tested() {
        let mut s = shapes();
        let case = CaseBuilder::new()
            .constr(s.red, 'r')
            .constr(s.circle, 'c')
            .build()
            .unwrap();
        let circle = s.m.construct(s.circle, &[make_smallint(5)]);
        assert_eq!(case.select(s.m.heap(), s.red.unboxed_value()), Ok(('r', Route::Unboxed)));
        assert_eq!(case.select(s.m.heap(), circle), Ok(('c', Route::Elided)));
    }

    #[test]
    fn integers_and_fallback() {
        let s = shapes();
        let case = CaseBuilder::new()
            .int(0, "zero")
            .int(1, "one")
            .fallback("many")
            .build()
            .unwrap();
        let heap = s.m.heap();
        assert_eq!(case.select(heap, make_smallint(0)), Ok(("zero", Route::Unboxed)));
        assert_eq!(case.select(heap, make_smallint(1)), Ok(("one", Route::Unboxed)));
        assert_eq!(case.select(heap, make_smallint(7)), Ok(("many", Route::Fallback)));
    }

    #[test]
    fn pairs_take_the_tier_two_default() {
        let mut s = shapes();
        let case = CaseBuilder::new()
            .constr(s.circle, 1)
            .constr(s.square, 2)
            .fallback(0)
            .build()
            .unwrap();
        let pair = s.m.make_pair(make_smallint(1), make_smallint(2));
        assert_eq!(case.select(s.m.heap(), pair), Ok((0, Route::Fallback)));
    }

    #[test]
    fn exhausted_arms_are_unreachable() {
        let s = shapes();
        let case = CaseBuilder::new()
            .constr(s.red, 1)
            .constr(s.green, 2)
            .constr(s.circle, 3)
            .constr(s.square, 4)
            .build()
            .unwrap();
        assert_eq!(
            case.select(s.m.heap(), make_smallint(9)),
            Err(RuntimeError::UnreachableCase)
        );
    }

    #[test]
    fn duplicate_arms_are_rejected() {
        let s = shapes();
        let err = CaseBuilder::new()
            .constr(s.circle, 1)
            .constr(s.circle, 2)
            .build()
            .unwrap_err();
        assert!(matches!(err, ProgramError::DuplicateCase { .. }));

        let err = CaseBuilder::new().int(3, 1).int(3, 2).build().unwrap_err();
        assert_eq!(
            err,
            ProgramError::DuplicateCase {
                key: "integer 3".into()
            }
        );
    }
}
