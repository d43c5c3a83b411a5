//! Deferred disposal of resources owned by a connection handle.
//!
//! A [`ResourceRegistry`] collects resources whose release must wait until
//! their owner is torn down. Registration is a pass-through so it can be
//! interposed at creation time:
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use scriptlite_core::{Resource, ResourceRegistry};
//!
//! #[derive(Clone)]
//! struct Handle(Rc<Cell<u32>>);
//!
//! impl Resource for Handle {
//!     fn release(&self) {
//!         self.0.set(self.0.get() + 1);
//!     }
//! }
//!
//! let released = Rc::new(Cell::new(0));
//! let mut registry = ResourceRegistry::new();
//! let handle = registry.register(Handle(released.clone()));
//! drop(handle);
//!
//! assert_eq!(registry.dispose_all(), 1);
//! assert_eq!(registry.dispose_all(), 0);
//! assert_eq!(released.get(), 1);
//! ```

/// Something that holds an engine resource until released.
pub trait Resource {
    /// Releases the underlying resource. Called once per registration.
    fn release(&self);
}

/// Ordered set of resources released together.
///
/// Resources are released newest first. Dropping a registry releases
/// whatever is still tracked.
#[derive(Debug)]
pub struct ResourceRegistry<R: Resource> {
    items: Vec<R>,
}

impl<R: Resource> Default for ResourceRegistry<R> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<R: Resource> ResourceRegistry<R> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks `resource` and hands it back unchanged.
    pub fn register(&mut self, resource: R) -> R
    where
        R: Clone,
    {
        self.items.push(resource.clone());
        resource
    }

    /// Releases every tracked resource once, then forgets them.
    ///
    /// Returns how many resources were released.
    pub fn dispose_all(&mut self) -> usize {
        let count = self.items.len();
        while let Some(item) = self.items.pop() {
            item.release();
        }
        count
    }

    /// Number of tracked resources.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<R: Resource> Drop for ResourceRegistry<R> {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
