//! The pull-push seam between dataflow stages.
//!
//! A stage receives records one at a time through `process` and is told
//! it will receive no more through `close`. The sorter implements this
//! trait upstream-facing and drives exactly one downstream instance.

use crate::error::{Error, Result};

/// A stage that accepts records one at a time.
///
/// Contract: `process` must not be called after `close`, and `close` is
/// called exactly once on the clean path. Errors are fatal to the stage;
/// nothing is retried.
pub trait Processor<T>: Send {
    fn process(&mut self, record: T) -> Result<()>;

    /// Flush any buffered work and finish the stage.
    fn close(&mut self) -> Result<()>;
}

impl<T, P> Processor<T> for Box<P>
where
    P: Processor<T> + ?Sized,
{
    fn process(&mut self, record: T) -> Result<()> {
        (**self).process(record)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Collecting sink: buffers everything it is given.
///
/// Useful as the tail of a small assembly and throughout the test suite,
/// where `closes` doubles as a close-exactly-once probe.
#[derive(Debug, Default)]
pub struct VecSink<T> {
    pub items: Vec<T>,
    pub closes: u32,
}

impl<T> VecSink<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            closes: 0,
        }
    }
}

impl<T: Send> Processor<T> for VecSink<T> {
    fn process(&mut self, record: T) -> Result<()> {
        if self.closes > 0 {
            return Err(Error::Protocol("process called on closed sink".into()));
        }
        self.items.push(record);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closes += 1;
        Ok(())
    }
}
