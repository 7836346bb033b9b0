use parking_lot::RwLock;

/// Lifecycle of a `WorkerPool`.
///
/// This is a simple state machine
/// New -> Started -> Stopped
///  |_________________^
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    #[default]
    New,
    Started,
    Stopped,
}

/// A `Status` guarded by a read/write lock. Transitions only ever move forward.
#[derive(Debug, Default)]
pub struct StatusCell(RwLock<Status>);

impl StatusCell {
    pub fn get(&self) -> Status {
        *self.0.read()
    }

    /// Transitions from `from` to `to`. Returns the current status as an error if it is not
    /// `from`.
    pub fn transition(&self, from: Status, to: Status) -> Result<(), Status> {
        let mut status = self.0.write();
        if *status == from {
            *status = to;
            Ok(())
        } else {
            Err(*status)
        }
    }

    /// Sets the status to `Stopped`. Returns `false` if it was already `Stopped`.
    pub fn stop(&self) -> bool {
        let mut status = self.0.write();
        let prev = std::mem::replace(&mut *status, Status::Stopped);
        prev != Status::Stopped
    }
}
