//! Resource lifecycle callbacks supplied by the pool's owner

use std::panic::{self, AssertUnwindSafe};

use crate::errors::BoxError;

/// Creates, checks and disposes of the resources a pool manages.
///
/// The pool never looks inside a resource; it only asks the factory
/// whether it is still usable and hands it back for disposal.
///
/// # Examples
///
/// ```
/// use partition_pool::{BoxError, ObjectFactory};
///
/// struct Sockets;
///
/// impl ObjectFactory<u32> for Sockets {
///     fn create(&self) -> Result<u32, BoxError> {
///         Ok(7)
///     }
///
///     fn validate(&self, fd: &u32) -> bool {
///         *fd != 0
///     }
/// }
///
/// assert!(Sockets.validate(&Sockets.create().unwrap()));
/// ```
pub trait ObjectFactory<T>: Send + Sync + 'static {
    /// Produce a new resource.
    fn create(&self) -> Result<T, BoxError>;

    /// Cheap liveness check run before an idle resource is reused.
    fn validate(&self, _resource: &T) -> bool {
        true
    }

    /// Release a resource the pool is discarding.
    fn destroy(&self, resource: T) -> Result<(), BoxError> {
        drop(resource);
        Ok(())
    }
}

type CreateFn<T> = Box<dyn Fn() -> Result<T, BoxError> + Send + Sync>;
type ValidateFn<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type DestroyFn<T> = Box<dyn Fn(T) -> Result<(), BoxError> + Send + Sync>;

/// An `ObjectFactory` assembled from closures
///
/// # Examples
///
/// ```
/// use partition_pool::{FnFactory, ObjectFactory};
///
/// let factory = FnFactory::new(|| Ok(String::from("conn")))
///     .with_validate(|s: &String| !s.is_empty());
///
/// let conn = factory.create().unwrap();
/// assert!(factory.validate(&conn));
/// ```
pub struct FnFactory<T> {
    create: CreateFn<T>,
    validate: Option<ValidateFn<T>>,
    destroy: Option<DestroyFn<T>>,
}

impl<T: 'static> FnFactory<T> {
    pub fn new<F>(create: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            create: Box::new(create),
            validate: None,
            destroy: None,
        }
    }

    pub fn with_validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Box::new(validate));
        self
    }

    pub fn with_destroy<F>(mut self, destroy: F) -> Self
    where
        F: Fn(T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.destroy = Some(Box::new(destroy));
        self
    }
}

impl<T: 'static> ObjectFactory<T> for FnFactory<T> {
    fn create(&self) -> Result<T, BoxError> {
        (self.create)()
    }

    fn validate(&self, resource: &T) -> bool {
        self.validate.as_ref().is_none_or(|validate| validate(resource))
    }

    fn destroy(&self, resource: T) -> Result<(), BoxError> {
        match &self.destroy {
            Some(destroy) => destroy(resource),
            None => Ok(()),
        }
    }
}

/// Run `validate`, treating a panicking validator as a failed check.
pub(crate) fn validate_guarded<T: 'static>(factory: &dyn ObjectFactory<T>, resource: &T) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| factory.validate(resource))) {
        Ok(valid) => valid,
        Err(_) => {
            tracing::warn!("validator panicked, treating resource as invalid");
            false
        }
    }
}

/// Run `destroy`, logging and swallowing errors and panics.
pub(crate) fn destroy_guarded<T: 'static>(factory: &dyn ObjectFactory<T>, resource: T, id: u64) {
    match panic::catch_unwind(AssertUnwindSafe(|| factory.destroy(resource))) {
        Ok(Ok(())) => tracing::debug!(resource = id, "destroyed resource"),
        Ok(Err(err)) => tracing::warn!(resource = id, error = %err, "failed to destroy resource"),
        Err(_) => tracing::warn!(resource = id, "destroy panicked"),
    }
}

/// Run `create`, converting a panicking factory into an error.
pub(crate) fn create_guarded<T: 'static>(factory: &dyn ObjectFactory<T>) -> Result<T, BoxError> {
    panic::catch_unwind(AssertUnwindSafe(|| factory.create()))
        .unwrap_or_else(|_| Err("resource factory panicked".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_fn_factory_defaults() {
        let factory = FnFactory::new(|| Ok(5u8));
        let value = factory.create().unwrap();
        assert!(factory.validate(&value));
        assert!(factory.destroy(value).is_ok());
    }

    #[test]
    fn test_panicking_validator_is_invalid() {
        let factory = FnFactory::new(|| Ok(1u8)).with_validate(|_| panic!("boom"));
        assert!(!validate_guarded(&factory, &1u8));
    }

    #[test]
    fn test_destroy_errors_are_swallowed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let factory = FnFactory::new(|| Ok(1u8)).with_destroy(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Err("socket already closed".into())
        });
        destroy_guarded(&factory, 1u8, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_create_becomes_error() {
        let factory: FnFactory<u8> = FnFactory::new(|| panic!("driver crashed"));
        assert!(create_guarded::<u8>(&factory).is_err());
    }
}
