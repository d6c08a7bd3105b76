//! Block layout knowledge the collector needs: how big a block is and which of
//! its words hold [`Value`]s.

use std::ops::Range;

use object::{
    Header, ObjRef, ObjectKind, Word,
    layout::{
        CLOSURE_ARGS_OFFSET, CONSTR_FIELDS_OFFSET, PAIR_WORDS, closure_words, constr_words,
    },
};

/// Number of words occupied by the block `r` points at.
#[inline]
pub fn block_words(space: &[Word], r: ObjRef) -> usize {
    if r.is_pair() {
        return PAIR_WORDS;
    }
    let header = Header::from_raw(space[r.offset()]);
    match header.kind() {
        ObjectKind::Constr => constr_words(header.nfields()),
        ObjectKind::Closure => closure_words(header.nfields()),
    }
}

/// Offsets, relative to the block start, of the words that are traced.
///
/// A closure's entry and arity words are raw and skipped.
#[inline]
pub fn traced_words(space: &[Word], r: ObjRef) -> Range<usize> {
    if r.is_pair() {
        return 0..PAIR_WORDS;
    }
    let header = Header::from_raw(space[r.offset()]);
    match header.kind() {
        ObjectKind::Constr => CONSTR_FIELDS_OFFSET..constr_words(header.nfields()),
        ObjectKind::Closure => CLOSURE_ARGS_OFFSET..closure_words(header.nfields()),
    }
}
