mod header;
pub mod layout;
mod value;

pub use header::{
    FALSE, FIELDS_BITS, FIRST_USER_UID, Header, MAX_FIELDS, MAX_UID, ObjectKind, TRUE, UID_BITS,
    UID_FALSE, UID_TRUE, UID_UNIT, UNIT, Uid, bool_value, make_header,
};
pub use value::{
    HEADER_TAG, ObjRef, REF_TAG, RESERVED_TAG, SMALLINT_BITS, SMALLINT_MAX, SMALLINT_MIN,
    SMALLINT_TAG, SWord, TAG_BITS, TAG_MASK, Unpacked, Value, WORD_BITS, WORD_BYTES, Word,
    make_smallint,
};
