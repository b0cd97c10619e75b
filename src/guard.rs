use std::cell::Cell;

// Held for one call into the capability. Cleared on drop, unwinding included.
#[must_use]
pub(crate) struct DeliveringGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> DeliveringGuard<'a> {
    pub fn try_acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            return None;
        }
        Some(Self { flag })
    }
}

impl Drop for DeliveringGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}
