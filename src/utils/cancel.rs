use std::cell::Cell;
use std::rc::Rc;

/// Shared flag observed by scheduled continuations.
///
/// Cloning hands out another handle to the same flag; once any handle cancels,
/// every holder sees it.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}
