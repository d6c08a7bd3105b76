//! Threaded-code programs.
//!
//! A program is a flat table of labels. Each bound label carries a piece of
//! host code that runs against the [`Machine`] and names the label to jump to
//! next. Constructors and functions are registered alongside so values can be
//! built and printed.

use std::{fmt, sync::Arc};

use object::{
    FIRST_USER_UID, Header, MAX_FIELDS, MAX_UID, UID_FALSE, UID_TRUE, UID_UNIT, Uid, Value,
};

use crate::{Machine, RuntimeError};

/// A code label: an index into the program's code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub(crate) u32);

impl Label {
    /// Sentinel continuation of the entry frame.
    pub const PROGRAM_END: Label = Label(0);
    /// Continuation of a saturated call made on behalf of an over-application.
    pub const APPLY_PENDING: Label = Label(1);

    const RESERVED: u32 = 2;

    #[inline(always)]
    pub fn id(self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub(crate) fn from_id(id: u32) -> Self {
        Label(id)
    }

    #[inline(always)]
    pub fn is_reserved(self) -> bool {
        self.0 < Self::RESERVED
    }
}

pub type Code = Box<dyn Fn(&mut Machine) -> Result<Label, RuntimeError>>;

/// How a constructor's values are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repr {
    /// The header word itself is the value. Only for nullary constructors.
    Unboxed,
    /// A heap block: header then fields.
    Boxed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstrRef {
    uid: Uid,
    nfields: usize,
    repr: Repr,
}

impl ConstrRef {
    pub const FALSE: ConstrRef = ConstrRef::builtin(UID_FALSE);
    pub const TRUE: ConstrRef = ConstrRef::builtin(UID_TRUE);
    pub const UNIT: ConstrRef = ConstrRef::builtin(UID_UNIT);

    const fn builtin(uid: Uid) -> Self {
        Self {
            uid,
            nfields: 0,
            repr: Repr::Unboxed,
        }
    }

    pub fn uid(self) -> Uid {
        self.uid
    }

    pub fn nfields(self) -> usize {
        self.nfields
    }

    pub fn repr(self) -> Repr {
        self.repr
    }

    pub fn header(self) -> Header {
        Header::constr(self.uid, self.nfields)
    }

    /// The value of a nullary unboxed constructor.
    pub fn unboxed_value(self) -> Value {
        debug_assert_eq!(self.repr, Repr::Unboxed);
        Value::unboxed(self.header())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionRef {
    uid: Uid,
    label: Label,
    arity: usize,
    max_alloc: usize,
}

impl FunctionRef {
    pub fn uid(self) -> Uid {
        self.uid
    }

    pub fn label(self) -> Label {
        self.label
    }

    pub fn arity(self) -> usize {
        self.arity
    }

    pub fn max_alloc(self) -> usize {
        self.max_alloc
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    UnboundLabel { name: String },
    DuplicateBinding { name: String },
    DuplicateCase { key: String },
    InvalidConstructor { name: String },
    InvalidFunction { name: String },
    TooManyUids,
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::UnboundLabel { name } => write!(f, "label `{name}` has no code"),
            ProgramError::DuplicateBinding { name } => {
                write!(f, "label `{name}` is bound twice")
            }
            ProgramError::DuplicateCase { key } => write!(f, "duplicate case arm for {key}"),
            ProgramError::InvalidConstructor { name } => {
                write!(f, "constructor `{name}` has an invalid field count for its representation")
            }
            ProgramError::InvalidFunction { name } => {
                write!(f, "function `{name}` takes more arguments than a closure can hold")
            }
            ProgramError::TooManyUids => write!(f, "uid space exhausted"),
        }
    }
}

impl std::error::Error for ProgramError {}

/// Printable names of the constructors and functions of a program.
#[derive(Debug, Clone)]
pub struct Names {
    constrs: Vec<Option<String>>,
    functions: Vec<Option<String>>,
}

impl Names {
    fn new() -> Self {
        let mut constrs = vec![None; FIRST_USER_UID as usize];
        constrs[UID_FALSE as usize] = Some("False".to_string());
        constrs[UID_TRUE as usize] = Some("True".to_string());
        constrs[UID_UNIT as usize] = Some("Unit".to_string());
        Self {
            constrs,
            functions: vec![None; FIRST_USER_UID as usize],
        }
    }

    fn record(table: &mut Vec<Option<String>>, uid: Uid, name: &str) {
        let idx = uid as usize;
        if table.len() <= idx {
            table.resize(idx + 1, None);
        }
        table[idx] = Some(name.to_string());
    }

    pub fn constr(&self, uid: Uid) -> Option<&str> {
        self.constrs.get(uid as usize)?.as_deref()
    }

    pub fn function(&self, uid: Uid) -> Option<&str> {
        self.functions.get(uid as usize)?.as_deref()
    }
}

impl Default for Names {
    fn default() -> Self {
        Self::new()
    }
}

struct Slot {
    name: String,
    max_alloc: usize,
    code: Option<Code>,
}

/// A validated program: every label has code.
pub struct Program {
    slots: Vec<Slot>,
    entry: Label,
    names: Arc<Names>,
}

impl Program {
    pub fn entry(&self) -> Label {
        self.entry
    }

    pub fn names(&self) -> &Arc<Names> {
        &self.names
    }

    pub fn label_name(&self, label: Label) -> &str {
        &self.slots[label.0 as usize].name
    }

    pub fn label_count(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    pub(crate) fn code(&self, label: Label) -> (usize, &Code) {
        let slot = &self.slots[label.0 as usize];
        match &slot.code {
            Some(code) => (slot.max_alloc, code),
            None => unreachable!("label `{}` has no code", slot.name),
        }
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("labels", &self.slots.len())
            .field("entry", &self.label_name(self.entry))
            .finish()
    }
}

pub struct ProgramBuilder {
    slots: Vec<Slot>,
    names: Names,
    next_uid: Uid,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    pub fn new() -> Self {
        let reserved = |name: &str| Slot {
            name: name.to_string(),
            max_alloc: 0,
            code: None,
        };
        Self {
            slots: vec![reserved("program_end"), reserved("apply_pending")],
            names: Names::new(),
            next_uid: FIRST_USER_UID,
        }
    }

    /// Reserve a label; code is bound to it later with [`Self::bind`].
    pub fn label(&mut self, name: &str) -> Label {
        let label = Label(self.slots.len() as u32);
        self.slots.push(Slot {
            name: name.to_string(),
            max_alloc: 0,
            code: None,
        });
        label
    }

    /// Attach code to `label`. With `max_alloc > 0` the machine reserves that
    /// many heap words before the code runs.
    pub fn bind<F>(&mut self, label: Label, max_alloc: usize, code: F) -> Result<(), ProgramError>
    where
        F: Fn(&mut Machine) -> Result<Label, RuntimeError> + 'static,
    {
        let slot = &mut self.slots[label.0 as usize];
        if label.is_reserved() || slot.code.is_some() {
            return Err(ProgramError::DuplicateBinding {
                name: slot.name.clone(),
            });
        }
        slot.max_alloc = max_alloc;
        slot.code = Some(Box::new(code));
        Ok(())
    }

    fn fresh_uid(&mut self) -> Result<Uid, ProgramError> {
        if self.next_uid > MAX_UID {
            return Err(ProgramError::TooManyUids);
        }
        let uid = self.next_uid;
        self.next_uid += 1;
        Ok(uid)
    }

    /// Declare a function: a uid for closures and an entry label.
    pub fn function(
        &mut self,
        name: &str,
        arity: usize,
        max_alloc: usize,
    ) -> Result<FunctionRef, ProgramError> {
        if arity > MAX_FIELDS {
            return Err(ProgramError::InvalidFunction {
                name: name.to_string(),
            });
        }
        let uid = self.fresh_uid()?;
        let label = self.label(name);
        Names::record(&mut self.names.functions, uid, name);
        Ok(FunctionRef {
            uid,
            label,
            arity,
            max_alloc,
        })
    }

    /// Bind the body of a declared function.
    pub fn define<F>(&mut self, function: FunctionRef, code: F) -> Result<(), ProgramError>
    where
        F: Fn(&mut Machine) -> Result<Label, RuntimeError> + 'static,
    {
        self.bind(function.label, function.max_alloc, code)
    }

    pub fn constructor(
        &mut self,
        name: &str,
        nfields: usize,
        repr: Repr,
    ) -> Result<ConstrRef, ProgramError> {
        if nfields > MAX_FIELDS || (repr == Repr::Unboxed && nfields != 0) {
            return Err(ProgramError::InvalidConstructor {
                name: name.to_string(),
            });
        }
        let uid = self.fresh_uid()?;
        Names::record(&mut self.names.constrs, uid, name);
        Ok(ConstrRef { uid, nfields, repr })
    }

    pub fn build(self, entry: Label) -> Result<Program, ProgramError> {
        if let Some(slot) = self
            .slots
            .iter()
            .enumerate()
            .find(|(i, slot)| !Label(*i as u32).is_reserved() && slot.code.is_none())
            .map(|(_, slot)| slot)
        {
            return Err(ProgramError::UnboundLabel {
                name: slot.name.clone(),
            });
        }
        log::debug!(
            "program built: {} labels, entry `{}`",
            self.slots.len(),
            self.slots[entry.0 as usize].name
        );
        Ok(Program {
            slots: self.slots,
            entry,
            names: Arc::new(self.names),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_labels_come_first() {
        let mut b = ProgramBuilder::new();
        let l = b.label("main");
        assert_eq!(l.id(), 2);
        assert!(Label::PROGRAM_END.is_reserved());
        assert!(Label::APPLY_PENDING.is_reserved());
        assert!(!l.is_reserved());
    }

    #[test]
    fn unbound_label_is_rejected() {
        let mut b = ProgramBuilder::new();
        let main = b.label("main");
        b.label("dangling");
        b.bind(main, 0, |m| Ok(m.ret(object::UNIT))).unwrap();
        assert_eq!(
            b.build(main).unwrap_err(),
            ProgramError::UnboundLabel {
                name: "dangling".into()
            }
        );
    }

    #[test]
    fn double_binding_is_rejected() {
        let mut b = ProgramBuilder::new();
        let main = b.label("main");
        b.bind(main, 0, |m| Ok(m.ret(object::UNIT))).unwrap();
        let err = b.bind(main, 0, |m| Ok(m.ret(object::UNIT))).unwrap_err();
        assert!(matches!(err, ProgramError::DuplicateBinding { .. }));
        assert!(b.bind(Label::PROGRAM_END, 0, |_| Ok(Label::PROGRAM_END)).is_err());
    }

    #[test]
    fn uids_are_unique_across_constructors_and_functions() {
        let mut b = ProgramBuilder::new();
        let nil = b.constructor("Nil", 0, Repr::Unboxed).unwrap();
        let cons = b.constructor("Cons", 2, Repr::Boxed).unwrap();
        let f = b.function("f", 1, 0).unwrap();
        assert_eq!(nil.uid(), FIRST_USER_UID);
        assert_eq!(cons.uid(), FIRST_USER_UID + 1);
        assert_eq!(f.uid(), FIRST_USER_UID + 2);
        assert_eq!(b.names.constr(cons.uid()), Some("Cons"));
        assert_eq!(b.names.function(f.uid()), Some("f"));
        assert_eq!(b.names.constr(UID_TRUE), Some("True"));
    }

    #[test]
    fn unboxed_constructor_must_be_nullary() {
        let mut b = ProgramBuilder::new();
        assert!(matches!(
            b.constructor("Bad", 1, Repr::Unboxed),
            Err(ProgramError::InvalidConstructor { .. })
        ));
        assert!(matches!(
            b.constructor("Wide", MAX_FIELDS + 1, Repr::Boxed),
            Err(ProgramError::InvalidConstructor { .. })
        ));
    }

    #[test]
    fn function_arity_must_fit_a_closure_header() {
        let mut b = ProgramBuilder::new();
        assert_eq!(
            b.function("wide", MAX_FIELDS + 1, 0),
            Err(ProgramError::InvalidFunction {
                name: "wide".into()
            })
        );
        let widest = b.function("widest", MAX_FIELDS, 0).unwrap();
        assert_eq!(widest.arity(), MAX_FIELDS);
    }

    #[test]
    fn builtin_constructor_values() {
        assert_eq!(ConstrRef::TRUE.unboxed_value(), object::TRUE);
        assert_eq!(ConstrRef::FALSE.unboxed_value(), object::FALSE);
        assert_eq!(ConstrRef::UNIT.unboxed_value(), object::UNIT);
    }
}
