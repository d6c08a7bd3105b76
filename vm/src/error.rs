use std::{fmt, process};

use heap::HeapError;

/// Fatal runtime conditions. None of them is recoverable; the binary hands
/// every one of them to [`error_exit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    OutOfMemory { requested: usize, live: usize, max: usize },
    DivisionByZero,
    AssertionFailed {
        file: &'static str,
        line: u32,
        condition: &'static str,
    },
    UnreachableCase,
    StackOverflow { limit: usize },
    Failure { message: String },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::OutOfMemory {
                requested,
                live,
                max,
            } => write!(
                f,
                "out of memory: cannot reserve {requested} words \
                 ({live} live, limit {max})"
            ),
            RuntimeError::DivisionByZero => write!(f, "division by zero"),
            RuntimeError::AssertionFailed {
                file,
                line,
                condition,
            } => write!(f, "{file}:{line}: assertion failed: {condition}"),
            RuntimeError::UnreachableCase => {
                write!(f, "pattern match reached an unreachable case")
            }
            RuntimeError::StackOverflow { limit } => {
                write!(f, "stack overflow (limit {limit} words)")
            }
            RuntimeError::Failure { message } => write!(f, "failure: {message}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<HeapError> for RuntimeError {
    fn from(err: HeapError) -> Self {
        match err {
            HeapError::OutOfMemory {
                requested,
                live,
                max,
            } => RuntimeError::OutOfMemory {
                requested,
                live,
                max,
            },
        }
    }
}

/// Runtime invariant check.
///
/// A failed condition returns [`RuntimeError::AssertionFailed`] from the
/// enclosing function. Compiled out without `debug_assertions`.
#[macro_export]
macro_rules! rt_assert {
    ($cond:expr) => {
        $crate::rt_assert!($cond, stringify!($cond))
    };
    ($cond:expr, $condition:expr) => {
        if cfg!(debug_assertions) && !($cond) {
            return Err($crate::RuntimeError::AssertionFailed {
                file: file!(),
                line: line!(),
                condition: $condition,
            });
        }
    };
}

/// Report a fatal error and terminate the process with status 1.
pub fn error_exit(err: &RuntimeError) -> ! {
    log::error!("{err}");
    eprintln!("fatal error: {err}");
    process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked(x: i32) -> Result<i32, RuntimeError> {
        rt_assert!(x > 0);
        Ok(x)
    }

    #[test]
    fn heap_error_converts() {
        let err: RuntimeError = HeapError::OutOfMemory {
            requested: 10,
            live: 4,
            max: 8,
        }
        .into();
        assert_eq!(
            err,
            RuntimeError::OutOfMemory {
                requested: 10,
                live: 4,
                max: 8
            }
        );
        assert!(err.to_string().contains("10 words"));
    }

    #[test]
    fn rt_assert_passes() {
        assert_eq!(checked(3), Ok(3));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn rt_assert_reports_location() {
        match checked(0) {
            Err(RuntimeError::AssertionFailed {
                file, condition, ..
            }) => {
                assert!(file.ends_with("error.rs"));
                assert_eq!(condition, "x > 0");
            }
            other => panic!("expected assertion failure, got {other:?}"),
        }
    }
}
