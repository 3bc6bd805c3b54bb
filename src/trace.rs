//! Diagnostic tracing for the pipeline stages.
//!
//! Each stage receives an explicit `Trace` handle instead of consulting a
//! process-wide debug toggle, so independent transpile invocations stay
//! independent. Debug lines are numbered in emission order.

use std::cell::Cell;

const PREFIX: &str = "[imba-bundler]";

#[derive(Debug, Default)]
pub struct Trace {
    debug: bool,
    step: Cell<u32>,
}

impl Trace {
    pub fn new(debug: bool) -> Self {
        Trace {
            debug,
            step: Cell::new(0),
        }
    }

    /// Numbered step line, printed only when debug tracing is enabled.
    pub fn debug(&self, message: impl AsRef<str>) {
        if self.debug {
            let step = self.step.get() + 1;
            self.step.set(step);
            eprintln!("{} {} {}", PREFIX, step, message.as_ref());
        }
    }

    /// Always printed.
    pub fn warn(&self, message: impl AsRef<str>) {
        eprintln!("{} warning: {}", PREFIX, message.as_ref());
    }

    /// A pre-formatted line (bundler diagnostics carry their own shape).
    pub fn report(&self, message: impl AsRef<str>) {
        eprintln!("{}", message.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_counter_advances_only_in_debug_mode() {
        let trace = Trace::new(false);
        trace.debug("ignored");
        assert_eq!(trace.step.get(), 0);

        let trace = Trace::new(true);
        trace.debug("one");
        trace.debug("two");
        assert_eq!(trace.step.get(), 2);
    }
}
