use std::any::Any;
use std::fmt::{self, Debug};
use std::panic::AssertUnwindSafe;

pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Wraps the payload of a `panic` caught while transforming an input, with an optional `detail`
/// describing where it was caught.
pub struct Panic {
    payload: PanicPayload,
    detail: Option<String>,
}

impl Panic {
    /// Attempts to call the provided function `f` and catches any panic. Returns either the return
    /// value of the function or a `Panic` created from the panic payload and the provided `detail`.
    pub fn try_call<O, F: FnOnce() -> O>(detail: Option<String>, f: F) -> Result<O, Self> {
        std::panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| Self { payload, detail })
    }

    /// Sets the detail describing where the panic was caught.
    pub(crate) fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Returns the payload of the panic.
    pub fn payload(&self) -> &PanicPayload {
        &self.payload
    }

    /// Returns the optional detail of the panic.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the panic message if the payload is a string, which is the case for panics raised
    /// with `panic!`.
    pub fn message(&self) -> Option<&str> {
        if let Some(s) = self.payload.downcast_ref::<&'static str>() {
            Some(s)
        } else {
            self.payload.downcast_ref::<String>().map(String::as_str)
        }
    }

    /// Consumes this `Panic` and resumes unwinding the thread.
    pub fn resume(self) -> ! {
        std::panic::resume_unwind(self.payload)
    }
}

impl Debug for Panic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Panic")
            .field("message", &self.message())
            .field("detail", &self.detail)
            .finish()
    }
}

impl fmt::Display for Panic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.message(), self.detail()) {
            (Some(msg), Some(detail)) => write!(f, "panicked in {detail}: {msg}"),
            (Some(msg), None) => write!(f, "panicked: {msg}"),
            (None, Some(detail)) => write!(f, "panicked in {detail}"),
            (None, None) => f.write_str("panicked"),
        }
    }
}
