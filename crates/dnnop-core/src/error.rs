use crate::device::DeviceType;
use crate::event::EventStatus;
use crate::shape::Shape;

/// All errors that can occur within dnnop.
///
/// Every variant is a consistency violation: a programming or precondition
/// error that aborts the current execution. Recoverable operator failures are
/// not errors; they are reported as `Ok(false)` from `run_on_device`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Slot index outside the arity the graph configured for this operator.
    #[error("{kind} index out of bounds: index {idx}, only {len} available")]
    IndexOutOfBounds {
        kind: &'static str,
        idx: usize,
        len: usize,
    },

    /// A blob holds a value of a different type than the one requested.
    #[error("blob '{blob}' type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        blob: String,
        expected: &'static str,
        got: &'static str,
    },

    /// An operator input names a blob that does not exist in the workspace.
    #[error("blob '{name}' not found in workspace")]
    BlobNotFound { name: String },

    /// A device context was constructed from an option for another device.
    #[error("invalid device option: expected {expected}, got {got}")]
    InvalidDevice {
        expected: DeviceType,
        got: DeviceType,
    },

    /// An event was recorded or waited on by a context of another device type.
    #[error("event device mismatch: event is {event}, context is {context}")]
    DeviceMismatch {
        event: DeviceType,
        context: DeviceType,
    },

    /// The event already reached a terminal state.
    #[error("event already finished with status {status}")]
    EventAlreadyFinished { status: EventStatus },

    /// Record was called twice on an event without finishing it in between.
    #[error("calling record multiple times on the same event")]
    EventMultipleRecord,

    /// Element count mismatch when creating a buffer from a vec.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// A math-kernel library call returned a non-success status.
    #[error("kernel call {call} failed with status {name} ({code})")]
    Kernel {
        call: String,
        code: i32,
        name: &'static str,
    },

    /// A failed `enforce!` check.
    #[error("{0}")]
    Enforce(String),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),

    /// An error with extra context appended after the original message.
    #[error("{source}\n{message}")]
    Context {
        source: Box<Error>,
        message: String,
    },
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    /// Append context to this error. The original message is kept as the
    /// prefix of the new message.
    pub fn append_message(self, message: impl Into<String>) -> Self {
        Error::Context {
            source: Box::new(self),
            message: message.into(),
        }
    }

    /// The innermost error, with every appended context stripped.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Convenience Result type used throughout dnnop.
pub type Result<T> = std::result::Result<T, Error>;

/// Return early with an `Error::Msg` built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}

/// Check a condition and return an `Error::Enforce` when it does not hold.
///
/// ```
/// # fn check(n: usize) -> dnnop_core::Result<()> {
/// dnnop_core::enforce!(n > 0, "expected a positive count, got {}", n);
/// # Ok(())
/// # }
/// assert!(check(1).is_ok());
/// assert!(check(0).is_err());
/// ```
#[macro_export]
macro_rules! enforce {
    ($cond:expr $(,)?) => {
        if !$cond {
            return Err($crate::Error::Enforce(format!(
                "[enforce fail at {}:{}] {}",
                file!(),
                line!(),
                stringify!($cond)
            )));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::Error::Enforce(format!(
                "[enforce fail at {}:{}] {}. {}",
                file!(),
                line!(),
                stringify!($cond),
                format!($($arg)*)
            )));
        }
    };
}
