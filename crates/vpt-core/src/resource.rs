//! Single-ownership slots for GPU resources.
//!
//! A [`ResourceSlot`] holds at most one live resource. Replacing the content
//! releases the old resource before the new one is created, and releasing an
//! empty slot is a no-op, so teardown paths can run any number of times.

/// A resource with an explicit, synchronous release.
pub trait Release {
    /// Frees the underlying resource.
    fn release(self);
}

/// Holds zero or one live resource and tags each occupant with a generation.
#[derive(Debug)]
pub struct ResourceSlot<T: Release> {
    resource: Option<T>,
    generation: u64,
}

impl<T: Release> ResourceSlot<T> {
    /// An empty slot.
    pub fn empty() -> Self {
        Self {
            resource: None,
            generation: 0,
        }
    }

    /// A slot holding `resource` as generation 1.
    pub fn with(resource: T) -> Self {
        Self {
            resource: Some(resource),
            generation: 1,
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.resource.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.resource.as_mut()
    }

    pub fn is_live(&self) -> bool {
        self.resource.is_some()
    }

    /// Increments every time a new resource is installed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Releases the current resource, if any.
    pub fn release(&mut self) {
        if let Some(resource) = self.resource.take() {
            resource.release();
        }
    }

    /// Releases the current resource, then installs the one built by `create`.
    ///
    /// If `create` fails the slot stays empty.
    pub fn replace_with<E, F>(&mut self, create: F) -> Result<&mut T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.release();
        let resource = create()?;
        self.generation += 1;
        Ok(self.resource.insert(resource))
    }
}

impl<T: Release> Default for ResourceSlot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Release> Drop for ResourceSlot<T> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Ledger {
        live: i32,
        peak: i32,
        released: Vec<u32>,
    }

    struct Tracked {
        id: u32,
        ledger: Rc<RefCell<Ledger>>,
    }

    impl Tracked {
        fn create(id: u32, ledger: &Rc<RefCell<Ledger>>) -> Result<Self, ()> {
            let mut l = ledger.borrow_mut();
            l.live += 1;
            l.peak = l.peak.max(l.live);
            Ok(Self {
                id,
                ledger: Rc::clone(ledger),
            })
        }
    }

    impl Release for Tracked {
        fn release(self) {
            let mut l = self.ledger.borrow_mut();
            l.live -= 1;
            l.released.push(self.id);
        }
    }

    #[test]
    fn test_replace_frees_before_create() {
        let ledger = Rc::new(RefCell::new(Ledger::default()));
        let mut slot = ResourceSlot::empty();
        for id in 0..5 {
            slot.replace_with(|| Tracked::create(id, &ledger)).unwrap();
        }
        assert_eq!(ledger.borrow().live, 1);
        assert_eq!(ledger.borrow().peak, 1);
        assert_eq!(ledger.borrow().released, vec![0, 1, 2, 3]);
        assert_eq!(slot.generation(), 5);
        assert_eq!(slot.get().map(|t| t.id), Some(4));
    }

    #[test]
    fn test_repeated_release_is_single_delete() {
        let ledger = Rc::new(RefCell::new(Ledger::default()));
        let mut slot = ResourceSlot::with(Tracked::create(7, &ledger).unwrap());
        slot.release();
        slot.release();
        drop(slot);
        assert_eq!(ledger.borrow().released, vec![7]);
        assert_eq!(ledger.borrow().live, 0);
    }

    #[test]
    fn test_failed_create_leaves_slot_empty() {
        let ledger = Rc::new(RefCell::new(Ledger::default()));
        let mut slot = ResourceSlot::with(Tracked::create(1, &ledger).unwrap());
        let result: Result<&mut Tracked, ()> = slot.replace_with(|| Err(()));
        assert!(result.is_err());
        assert!(!slot.is_live());
        assert_eq!(ledger.borrow().live, 0);
        assert_eq!(slot.generation(), 1);
    }

    #[test]
    fn test_drop_releases() {
        let ledger = Rc::new(RefCell::new(Ledger::default()));
        {
            let _slot = ResourceSlot::with(Tracked::create(3, &ledger).unwrap());
        }
        assert_eq!(ledger.borrow().live, 0);
    }
}
