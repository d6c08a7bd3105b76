//! Word offsets of the heap block layouts.
//!
//! ```text
//! constructor: [header][field 0]…[field n-1]
//! closure:     [header][entry][nargs][captured 0]…[captured c-1]
//! pair:        [fst][snd]
//! ```
//!
//! `entry` and `nargs` are raw words, never traced.

pub const HEADER_OFFSET: usize = 0;

pub const CONSTR_FIELDS_OFFSET: usize = 1;

pub const CLOSURE_ENTRY_OFFSET: usize = 1;
pub const CLOSURE_NARGS_OFFSET: usize = 2;
pub const CLOSURE_ARGS_OFFSET: usize = 3;

pub const PAIR_WORDS: usize = 2;
pub const PAIR_FST: usize = 0;
pub const PAIR_SND: usize = 1;

#[inline(always)]
pub const fn constr_words(nfields: usize) -> usize {
    CONSTR_FIELDS_OFFSET + nfields
}

#[inline(always)]
pub const fn closure_words(captured: usize) -> usize {
    CLOSURE_ARGS_OFFSET + captured
}
