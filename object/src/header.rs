use crate::value::{HEADER_TAG, TAG_BITS, Value, WORD_BITS, Word};

/// Constructor or function identifier.
pub type Uid = u32;

/// What a header describes, stored in the bit right above the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectKind {
    Constr = 0,
    Closure = 1,
}

const KIND_SHIFT: u32 = TAG_BITS;
pub const FIELDS_SHIFT: u32 = TAG_BITS + 1;

#[cfg(not(feature = "bits32"))]
pub const FIELDS_BITS: u32 = 24;
#[cfg(not(feature = "bits32"))]
pub const UID_BITS: u32 = 32;

#[cfg(feature = "bits32")]
pub const FIELDS_BITS: u32 = 8;
#[cfg(feature = "bits32")]
pub const UID_BITS: u32 = 21;

pub const UID_SHIFT: u32 = FIELDS_SHIFT + FIELDS_BITS;
pub const MAX_FIELDS: usize = (1 << FIELDS_BITS) - 1;
pub const MAX_UID: Uid = ((1u64 << UID_BITS) - 1) as Uid;

const _: () = assert!(UID_SHIFT + UID_BITS <= WORD_BITS);

pub const UID_FALSE: Uid = 0;
pub const UID_TRUE: Uid = 1;
pub const UID_UNIT: Uid = 2;
/// First uid handed out to program constructors and functions.
pub const FIRST_USER_UID: Uid = 8;

/// The header word of a boxed block, or an unboxed constructor value.
///
/// ```text
/// [tag:2 = 0b11] [kind:1] [nfields:FIELDS_BITS] [uid:UID_BITS] [zero…]
/// ```
///
/// For closures `uid` is the function uid and `nfields` the number of
/// captured arguments.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Header(Word);

impl Header {
    #[inline(always)]
    pub const fn new(kind: ObjectKind, uid: Uid, nfields: usize) -> Self {
        debug_assert!(uid <= MAX_UID, "uid out of range");
        debug_assert!(nfields <= MAX_FIELDS, "field count out of range");
        Self(
            HEADER_TAG
                | ((kind as Word) << KIND_SHIFT)
                | ((nfields as Word) << FIELDS_SHIFT)
                | ((uid as Word) << UID_SHIFT),
        )
    }

    #[inline(always)]
    pub const fn constr(uid: Uid, nfields: usize) -> Self {
        Self::new(ObjectKind::Constr, uid, nfields)
    }

    #[inline(always)]
    pub const fn closure(fuid: Uid, captured: usize) -> Self {
        Self::new(ObjectKind::Closure, fuid, captured)
    }

    #[inline(always)]
    pub const fn raw(self) -> Word {
        self.0
    }

    #[inline(always)]
    pub const fn from_raw(raw: Word) -> Self {
        Self(raw)
    }

    #[inline(always)]
    pub const fn kind(self) -> ObjectKind {
        if (self.0 >> KIND_SHIFT) & 1 == 1 {
            ObjectKind::Closure
        } else {
            ObjectKind::Constr
        }
    }

    #[inline(always)]
    pub const fn is_closure(self) -> bool {
        matches!(self.kind(), ObjectKind::Closure)
    }

    #[inline(always)]
    pub const fn uid(self) -> Uid {
        ((self.0 >> UID_SHIFT) & (MAX_UID as Word)) as Uid
    }

    #[inline(always)]
    pub const fn nfields(self) -> usize {
        ((self.0 >> FIELDS_SHIFT) & (MAX_FIELDS as Word)) as usize
    }
}

/// Pack a constructor uid and field count.
#[inline(always)]
pub const fn make_header(uid: Uid, nfields: usize) -> Header {
    Header::constr(uid, nfields)
}

pub const FALSE: Value = Value::unboxed(Header::constr(UID_FALSE, 0));
pub const TRUE: Value = Value::unboxed(Header::constr(UID_TRUE, 0));
pub const UNIT: Value = Value::unboxed(Header::constr(UID_UNIT, 0));

#[inline(always)]
pub const fn bool_value(b: bool) -> Value {
    if b { TRUE } else { FALSE }
}

impl core::fmt::Debug for Header {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Header")
            .field("kind", &self.kind())
            .field("uid", &self.uid())
            .field("nfields", &self.nfields())
            .finish()
    }
}
