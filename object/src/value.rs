use crate::header::Header;

/// Machine word. 64 bits unless the `bits32` feature is enabled.
#[cfg(not(feature = "bits32"))]
pub type Word = u64;
/// Signed counterpart of [`Word`].
#[cfg(not(feature = "bits32"))]
pub type SWord = i64;

#[cfg(feature = "bits32")]
pub type Word = u32;
#[cfg(feature = "bits32")]
pub type SWord = i32;

pub const WORD_BITS: u32 = Word::BITS;
pub const WORD_BYTES: usize = size_of::<Word>();

/// Tag constants.
pub const TAG_BITS: u32 = 2;
pub const TAG_MASK: Word = 0b11;
pub const SMALLINT_TAG: Word = 0b00;
pub const REF_TAG: Word = 0b01;
pub const RESERVED_TAG: Word = 0b10;
pub const HEADER_TAG: Word = 0b11;

pub const SMALLINT_BITS: u32 = WORD_BITS - TAG_BITS;
pub const SMALLINT_MAX: SWord = SWord::MAX >> TAG_BITS;
pub const SMALLINT_MIN: SWord = SWord::MIN >> TAG_BITS;

/// Reference to a heap block: a word offset into the heap arena plus a flag
/// marking header-less pair blocks.
///
/// ```text
/// [offset:W-3][pair:1]
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjRef(Word);

impl ObjRef {
    pub const MAX_OFFSET: usize = (Word::MAX >> (TAG_BITS + 1)) as usize;

    #[inline(always)]
    pub fn object(offset: usize) -> Self {
        debug_assert!(offset <= Self::MAX_OFFSET, "heap offset overflow");
        Self((offset as Word) << 1)
    }

    #[inline(always)]
    pub fn pair(offset: usize) -> Self {
        debug_assert!(offset <= Self::MAX_OFFSET, "heap offset overflow");
        Self(((offset as Word) << 1) | 1)
    }

    #[inline(always)]
    pub const fn offset(self) -> usize {
        (self.0 >> 1) as usize
    }

    #[inline(always)]
    pub const fn is_pair(self) -> bool {
        self.0 & 1 == 1
    }

    /// Same kind of block at a new offset. Used when the collector relocates.
    #[inline(always)]
    pub fn relocated(self, offset: usize) -> Self {
        if self.is_pair() {
            Self::pair(offset)
        } else {
            Self::object(offset)
        }
    }
}

impl core::fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_pair() {
            write!(f, "Pair@{}", self.offset())
        } else {
            write!(f, "Obj@{}", self.offset())
        }
    }
}

/// A tagged word.
///
/// Encoding (low two bits):
/// - **Small integer**: `...XX00`: `WORD_BITS - 2` bit signed integer.
/// - **Reference**:     `...XX01`: [`ObjRef`] to a boxed block.
/// - **Header**:        `...XX11`: an unboxed constructor, or the first word
///   of a boxed block.
///
/// `10` is reserved and never produced.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Value(Word);

/// Decoded view of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unpacked {
    SmallInt(SWord),
    Boxed(ObjRef),
    Unboxed(Header),
}

impl Value {
    #[inline(always)]
    pub const fn raw(self) -> Word {
        self.0
    }

    #[inline(always)]
    pub const fn from_raw(raw: Word) -> Self {
        Self(raw)
    }

    #[inline(always)]
    pub const fn tag(self) -> Word {
        self.0 & TAG_MASK
    }

    // ── Small integers ─────────────────────────────────────────────

    #[inline(always)]
    pub const fn is_smallint(self) -> bool {
        self.tag() == SMALLINT_TAG
    }

    #[inline(always)]
    pub fn smallint(n: SWord) -> Self {
        debug_assert!(
            (SMALLINT_MIN..=SMALLINT_MAX).contains(&n),
            "small integer overflow: {n}"
        );
        Self::smallint_wrapping(n)
    }

    /// Encode `n`, discarding the bits that do not fit.
    #[inline(always)]
    pub const fn smallint_wrapping(n: SWord) -> Self {
        Self(n.wrapping_shl(TAG_BITS) as Word)
    }

    #[inline(always)]
    pub fn smallint_value(self) -> SWord {
        debug_assert!(self.is_smallint(), "not a small integer: {self:?}");
        (self.0 as SWord) >> TAG_BITS
    }

    // ── References ─────────────────────────────────────────────────

    #[inline(always)]
    pub const fn is_ref(self) -> bool {
        self.tag() == REF_TAG
    }

    #[inline(always)]
    pub const fn boxed(r: ObjRef) -> Self {
        Self((r.0 << TAG_BITS) | REF_TAG)
    }

    #[inline(always)]
    pub const fn as_obj_ref(self) -> Option<ObjRef> {
        if self.is_ref() {
            Some(ObjRef(self.0 >> TAG_BITS))
        } else {
            None
        }
    }

    // ── Headers ────────────────────────────────────────────────────

    #[inline(always)]
    pub const fn is_header(self) -> bool {
        self.tag() == HEADER_TAG
    }

    /// An unboxed constructor value.
    #[inline(always)]
    pub const fn unboxed(header: Header) -> Self {
        Self(header.raw())
    }

    #[inline(always)]
    pub const fn as_header(self) -> Option<Header> {
        if self.is_header() {
            Some(Header::from_raw(self.0))
        } else {
            None
        }
    }

    // ── Code addresses ─────────────────────────────────────────────

    /// Continuations and frame links live on the stack as small integers so
    /// the collector never treats them as references.
    #[inline(always)]
    pub fn code_address(label: u32) -> Self {
        Self::smallint(label as SWord)
    }

    #[inline(always)]
    pub fn as_code_address(self) -> u32 {
        self.smallint_value() as u32
    }

    pub fn unpack(self) -> Unpacked {
        match self.tag() {
            SMALLINT_TAG => Unpacked::SmallInt(self.smallint_value()),
            REF_TAG => Unpacked::Boxed(ObjRef(self.0 >> TAG_BITS)),
            HEADER_TAG => Unpacked::Unboxed(Header::from_raw(self.0)),
            _ => unreachable!("reserved tag in value {:#x}", self.0),
        }
    }
}

/// Encode a small integer.
#[inline(always)]
pub fn make_smallint(n: SWord) -> Value {
    Value::smallint(n)
}

impl From<Unpacked> for Value {
    fn from(value: Unpacked) -> Self {
        match value {
            Unpacked::SmallInt(n) => Value::smallint(n),
            Unpacked::Boxed(r) => Value::boxed(r),
            Unpacked::Unboxed(h) => Value::unboxed(h),
        }
    }
}

impl core::fmt::Debug for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.tag() {
            SMALLINT_TAG => write!(f, "SmallInt({})", self.smallint_value()),
            REF_TAG => write!(f, "Ref({:?})", ObjRef(self.0 >> TAG_BITS)),
            HEADER_TAG => write!(f, "{:?}", Header::from_raw(self.0)),
            _ => write!(f, "Reserved(0x{:x})", self.0),
        }
    }
}
