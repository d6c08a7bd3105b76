//! Sample programs written against [`ProgramBuilder`], standing in for the
//! output of a compiler. Each takes one integer parameter.

use object::{
    SMALLINT_MAX, SMALLINT_MIN, SWord, Value, layout::closure_words, layout::constr_words,
    make_smallint,
};

use crate::{
    CaseBuilder, Program, ProgramBuilder, ProgramError, Repr,
    primitives::{equal, fixnum},
};

pub struct Demo {
    pub name: &'static str,
    pub description: &'static str,
    pub default_arg: SWord,
    pub build: fn(SWord) -> Result<Program, ProgramError>,
}

pub const DEMOS: &[Demo] = &[
    Demo {
        name: "toplevel",
        description: "return the integer 789",
        default_arg: 0,
        build: toplevel,
    },
    Demo {
        name: "sum_loop",
        description: "sum 1..n with a self tail call",
        default_arg: 1_000_000,
        build: sum_loop,
    },
    Demo {
        name: "fib",
        description: "naive doubly recursive fibonacci",
        default_arg: 25,
        build: fib,
    },
    Demo {
        name: "curry",
        description: "partial, saturated and over-application of closures",
        default_arg: 10,
        build: curry,
    },
    Demo {
        name: "list_sum",
        description: "build the list 1..n on the heap and sum it with a case",
        default_arg: 10_000,
        build: list_sum,
    },
    Demo {
        name: "pairs",
        description: "build a pair and swap it",
        default_arg: 10,
        build: pairs,
    },
    Demo {
        name: "equal",
        description: "compare two separately built lists of length n",
        default_arg: 100,
        build: equal_lists,
    },
];

impl Demo {
    /// The parameter to run with: `given`, if it is a small integer, or the
    /// default.
    pub fn arg(&self, given: Option<i64>) -> Result<SWord, String> {
        let Some(n) = given else {
            return Ok(self.default_arg);
        };
        match SWord::try_from(n) {
            Ok(n) if (SMALLINT_MIN..=SMALLINT_MAX).contains(&n) => Ok(n),
            _ => Err(format!(
                "Demo parameter {n} out of range {SMALLINT_MIN}..={SMALLINT_MAX}"
            )),
        }
    }
}

pub fn find(name: &str) -> Option<&'static Demo> {
    DEMOS.iter().find(|d| d.name == name)
}

#[inline(always)]
fn int(n: SWord) -> Value {
    make_smallint(n)
}

pub fn toplevel(_: SWord) -> Result<Program, ProgramError> {
    let mut b = ProgramBuilder::new();
    let main = b.label("main");
    b.bind(main, 0, |m| Ok(m.ret(int(789))))?;
    b.build(main)
}

pub fn sum_loop(n: SWord) -> Result<Program, ProgramError> {
    let mut b = ProgramBuilder::new();
    let main = b.label("main");
    let lp = b.label("loop");
    let step = b.label("loop_step");
    let done = b.label("loop_done");

    b.bind(main, 0, move |m| m.tail_call(lp, &[int(n), int(0)]))?;
    b.bind(lp, 0, move |m| m.branch(fixnum::le(m.arg(0), int(0)), done, step))?;
    b.bind(step, 0, move |m| {
        let (i, acc) = (m.arg(0), m.arg(1));
        m.tail_call(lp, &[fixnum::sub(i, int(1)), fixnum::add(acc, i)])
    })?;
    b.bind(done, 0, |m| Ok(m.ret(m.arg(1))))?;
    b.build(main)
}

pub fn fib(n: SWord) -> Result<Program, ProgramError> {
    let mut b = ProgramBuilder::new();
    let main = b.label("main");
    let fib = b.function("fib", 1, 0)?;
    let small = b.label("fib_small");
    let big = b.label("fib_big");
    let k1 = b.label("fib_k1");
    let k2 = b.label("fib_k2");

    b.bind(main, 0, move |m| m.tail_call(fib.label(), &[int(n)]))?;
    b.define(fib, move |m| m.branch(fixnum::lt(m.arg(0), int(2)), small, big))?;
    b.bind(small, 0, |m| Ok(m.ret(m.arg(0))))?;
    b.bind(big, 0, move |m| {
        m.call(fib.label(), &[fixnum::sub(m.arg(0), int(1))], k1)
    })?;
    b.bind(k1, 0, move |m| {
        m.push_local(m.result())?;
        m.call(fib.label(), &[fixnum::sub(m.arg(0), int(2))], k2)
    })?;
    b.bind(k2, 0, |m| {
        let v = fixnum::add(m.local(1), m.result());
        Ok(m.ret(v))
    })?;
    b.build(main)
}

/// `add3 a b c = a + b + c` and `adder x = add3 x`.
///
/// Computes `(add3 n) (2n) (3n) + adder n 1 2`, i.e. `7n + 3`.
pub fn curry(n: SWord) -> Result<Program, ProgramError> {
    let mut b = ProgramBuilder::new();
    let add3 = b.function("add3", 3, 0)?;
    let adder = b.function("adder", 1, closure_words(1))?;
    let main = b.label("main");
    let k1 = b.label("k1");
    let k2 = b.label("k2");
    let k3 = b.label("k3");
    let k4 = b.label("k4");

    b.define(add3, |m| {
        let v = fixnum::add(fixnum::add(m.arg(0), m.arg(1)), m.arg(2));
        Ok(m.ret(v))
    })?;
    b.define(adder, move |m| {
        let c = m.make_closure(add3, &[m.arg(0)]);
        Ok(m.ret(c))
    })?;

    // Frame temporaries: 0 add3, 1 adder, 2 add3 n, 3 add3 n 2n, 4 6n.
    b.bind(main, 2 * closure_words(0), move |m| {
        let f = m.make_closure(add3, &[]);
        let g = m.make_closure(adder, &[]);
        m.push_local(f)?;
        m.push_local(g)?;
        m.call_closures(f, &[int(n)], k1)
    })?;
    b.bind(k1, 0, move |m| {
        let p1 = m.result();
        m.push_local(p1)?;
        m.call_closures(p1, &[fixnum::mul(int(2), int(n))], k2)
    })?;
    b.bind(k2, 0, move |m| {
        let p2 = m.result();
        m.push_local(p2)?;
        m.call_closures(p2, &[fixnum::mul(int(3), int(n))], k3)
    })?;
    b.bind(k3, 0, move |m| {
        m.push_local(m.result())?;
        let g = m.local(1);
        m.call_closures(g, &[int(n), int(1), int(2)], k4)
    })?;
    b.bind(k4, 0, |m| {
        let v = fixnum::add(m.local(4), m.result());
        Ok(m.ret(v))
    })?;
    b.build(main)
}

/// Build `Cons(1, Cons(2, … Nil))` one cell per step, then fold it with a
/// case over `Nil | Cons`.
pub fn list_sum(n: SWord) -> Result<Program, ProgramError> {
    let mut b = ProgramBuilder::new();
    let nil = b.constructor("Nil", 0, Repr::Unboxed)?;
    let cons = b.constructor("Cons", 2, Repr::Boxed)?;
    let main = b.label("main");
    let build = b.label("build");
    let build_step = b.label("build_step");
    let build_done = b.label("build_done");
    let sum = b.label("sum");
    let sum_nil = b.label("sum_nil");
    let sum_cons = b.label("sum_cons");

    let case = CaseBuilder::new()
        .constr(nil, sum_nil)
        .constr(cons, sum_cons)
        .build()?;

    b.bind(main, 0, move |m| m.tail_call(build, &[int(n), nil.unboxed_value()]))?;
    b.bind(build, constr_words(2), move |m| {
        m.branch(fixnum::le(m.arg(0), int(0)), build_done, build_step)
    })?;
    b.bind(build_step, 0, move |m| {
        let (i, acc) = (m.arg(0), m.arg(1));
        let cell = m.construct(cons, &[i, acc]);
        m.tail_call(build, &[fixnum::sub(i, int(1)), cell])
    })?;
    b.bind(build_done, 0, move |m| m.tail_call(sum, &[m.arg(1), int(0)]))?;
    b.bind(sum, 0, move |m| m.select(&case, m.arg(0)))?;
    b.bind(sum_nil, 0, |m| Ok(m.ret(m.arg(1))))?;
    b.bind(sum_cons, 0, move |m| {
        let (list, acc) = (m.arg(0), m.arg(1));
        let (head, tail) = (m.field(list, 0), m.field(list, 1));
        m.tail_call(sum, &[tail, fixnum::add(acc, head)])
    })?;
    b.build(main)
}

pub fn pairs(n: SWord) -> Result<Program, ProgramError> {
    let mut b = ProgramBuilder::new();
    let main = b.label("main");
    let swap = b.label("swap");

    b.bind(main, 2, move |m| {
        let p = m.make_pair(int(n), fixnum::mul(int(n), int(n)));
        m.trace(p);
        m.tail_call(swap, &[p])
    })?;
    b.bind(swap, 2, |m| {
        let p = m.arg(0);
        let q = m.make_pair(m.snd(p), m.fst(p));
        Ok(m.ret(q))
    })?;
    b.build(main)
}

pub fn equal_lists(n: SWord) -> Result<Program, ProgramError> {
    let mut b = ProgramBuilder::new();
    let cons = b.constructor("Cons", 2, Repr::Boxed)?;
    let nil = b.constructor("Nil", 0, Repr::Unboxed)?;
    let main = b.label("main");
    let len = n.max(0) as usize;

    b.bind(main, 2 * len * constr_words(2), move |m| {
        let mut lists = [nil.unboxed_value(); 2];
        for list in &mut lists {
            for i in (1..=len as SWord).rev() {
                *list = m.construct(cons, &[int(i), *list]);
            }
        }
        let v = equal(m.heap(), lists[0], lists[1]);
        Ok(m.ret(v))
    })?;
    b.build(main)
}
