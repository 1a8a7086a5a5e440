//! Resources released together with a module

use std::fmt;
use std::sync::Mutex;

/// A resource owned by a module and released when the module goes away
#[cfg_attr(test, mockall::automock)]
pub trait Disposable {
    fn dispose(&mut self);
}

/// Handle of a registered disposable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisposableId(usize);

type Slot = Option<Box<dyn Disposable + Send>>;

/// Index arena of disposables
///
/// Entries are released in reverse registration order, either explicitly or
/// when the arena is dropped. Releasing an entry leaves its slot empty so
/// handles stay valid.
#[derive(Default)]
pub struct DisposableArena {
    slots: Mutex<Vec<Slot>>,
}

impl DisposableArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&mut self) -> &mut Vec<Slot> {
        self.slots.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&mut self, disposable: Box<dyn Disposable + Send>) -> DisposableId {
        let slots = self.slots();
        slots.push(Some(disposable));
        DisposableId(slots.len() - 1)
    }

    /// Number of registered entries not yet released
    pub fn live(&mut self) -> usize {
        self.slots().iter().filter(|slot| slot.is_some()).count()
    }

    /// Release one entry early; `false` if it was already released
    pub fn dispose(&mut self, id: DisposableId) -> bool {
        match self.slots().get_mut(id.0).and_then(Option::take) {
            Some(mut disposable) => {
                disposable.dispose();
                true
            }
            None => false,
        }
    }

    /// Release every entry registered at or after `mark`, newest first
    pub fn dispose_from(&mut self, mark: usize) {
        let slots = self.slots();
        while slots.len() > mark {
            if let Some(Some(mut disposable)) = slots.pop() {
                disposable.dispose();
            }
        }
    }

    pub fn dispose_all(&mut self) {
        self.dispose_from(0);
    }

    pub(crate) fn mark(&mut self) -> usize {
        self.slots().len()
    }
}

impl Drop for DisposableArena {
    fn drop(&mut self) {
        let remaining = self.live();
        if remaining > 0 {
            log::debug!("Disposing {} module resources", remaining);
        }
        self.dispose_all();
    }
}

impl fmt::Debug for DisposableArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.slots.lock().map(|slots| slots.len()).unwrap_or(0);
        f.debug_struct("DisposableArena")
            .field("slots", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    #[test]
    fn test_reverse_order_on_drop() {
        let mut seq = Sequence::new();
        let mut first = MockDisposable::new();
        let mut second = MockDisposable::new();
        second
            .expect_dispose()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        first
            .expect_dispose()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let mut arena = DisposableArena::new();
        arena.register(Box::new(first));
        arena.register(Box::new(second));
        assert_eq!(arena.live(), 2);
        drop(arena);
    }

    #[test]
    fn test_early_release_is_not_repeated() {
        let mut only = MockDisposable::new();
        only.expect_dispose().times(1).return_const(());

        let mut arena = DisposableArena::new();
        let id = arena.register(Box::new(only));
        assert!(arena.dispose(id));
        assert!(!arena.dispose(id));
        assert_eq!(arena.live(), 0);
    }

    #[test]
    fn test_dispose_from_mark() {
        let mut kept = MockDisposable::new();
        kept.expect_dispose().times(1).return_const(());
        let mut rolled_back = MockDisposable::new();
        rolled_back.expect_dispose().times(1).return_const(());

        let mut arena = DisposableArena::new();
        arena.register(Box::new(kept));
        let mark = arena.mark();
        arena.register(Box::new(rolled_back));
        arena.dispose_from(mark);
        assert_eq!(arena.live(), 1);
    }
}
