//! Threaded-code runtime: a trampoline over code labels, an explicit stack
//! with a manual calling convention, closures with partial and
//! over-application, and two-tier case dispatch over tagged values.

pub mod alloc;
pub mod case;
mod closure;
pub mod demos;
mod error;
pub mod interpreter;
pub mod output;
pub mod primitives;
pub mod program;
pub mod stack;

pub use alloc::ClosureView;
pub use case::{CaseBuilder, CaseDispatch, Route};
pub use error::{RuntimeError, error_exit};
pub use interpreter::{Machine, MachineSettings};
pub use output::{CollectSink, DiscardSink, Observed, ObservedKind, OutputSink, StdoutSink};
pub use program::{ConstrRef, FunctionRef, Label, Program, ProgramBuilder, ProgramError, Repr};
pub use stack::Stack;
