//! Construction and retirement of pooled instances

use crate::errors::FactoryError;
use std::collections::VecDeque;
use std::fmt;

/// A value that can live in a pool.
///
/// Every pooled type implements this trait. The provided `recycle` does
/// nothing; types with caller-visible state override it to clear that state
/// before the instance is handed to the next caller (the "recyclable"
/// capability). The pool calls `recycle` on every release that re-pools the
/// instance.
///
/// # Examples
///
/// ```
/// use poolkit::Poolable;
///
/// struct Buffer {
///     bytes: Vec<u8>,
/// }
///
/// impl Poolable for Buffer {
///     fn recycle(&mut self) {
///         self.bytes.clear();
///     }
/// }
/// ```
pub trait Poolable: Send + 'static {
    /// Reset caller-visible state before reuse
    fn recycle(&mut self) {}
}

macro_rules! plain_poolable {
    ($($ty:ty),* $(,)?) => {
        $(impl Poolable for $ty {})*
    };
}

plain_poolable!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, bool, char);

impl Poolable for String {
    fn recycle(&mut self) {
        self.clear();
    }
}

impl<T: Send + 'static> Poolable for Vec<T> {
    fn recycle(&mut self) {
        self.clear();
    }
}

impl<T: Send + 'static> Poolable for VecDeque<T> {
    fn recycle(&mut self) {
        self.clear();
    }
}

impl<T: Poolable> Poolable for Box<T> {
    fn recycle(&mut self) {
        (**self).recycle();
    }
}

/// Constructs and retires the instances held by a pool.
///
/// A factory is created once per resource type and outlives every instance
/// it creates. `retire` is best effort: pools log and swallow its errors.
pub trait ObjectFactory: Send + Sync + 'static {
    /// The pooled value type
    type Object: Poolable;

    /// Construct a new instance
    fn create(&self) -> Result<Self::Object, FactoryError>;

    /// Release any resources held by an instance leaving the pool
    fn retire(&self, object: Self::Object) -> Result<(), FactoryError> {
        drop(object);
        Ok(())
    }
}

type CreateFn<T> = Box<dyn Fn() -> Result<T, FactoryError> + Send + Sync>;
type RetireFn<T> = Box<dyn Fn(T) -> Result<(), FactoryError> + Send + Sync>;

/// Factory built from closures
///
/// # Examples
///
/// ```
/// use poolkit::{FnFactory, ObjectFactory};
///
/// let factory = FnFactory::infallible(|| String::with_capacity(64));
/// let s = factory.create().unwrap();
/// assert!(s.capacity() >= 64);
/// ```
pub struct FnFactory<T> {
    create: CreateFn<T>,
    retire: Option<RetireFn<T>>,
}

impl<T: Poolable> FnFactory<T> {
    /// Create a factory from a fallible constructor
    pub fn new<C>(create: C) -> Self
    where
        C: Fn() -> Result<T, FactoryError> + Send + Sync + 'static,
    {
        Self {
            create: Box::new(create),
            retire: None,
        }
    }

    /// Create a factory from a constructor that cannot fail
    pub fn infallible<C>(create: C) -> Self
    where
        C: Fn() -> T + Send + Sync + 'static,
    {
        Self::new(move || Ok(create()))
    }

    /// Attach a retirement hook
    pub fn with_retire<R>(mut self, retire: R) -> Self
    where
        R: Fn(T) -> Result<(), FactoryError> + Send + Sync + 'static,
    {
        self.retire = Some(Box::new(retire));
        self
    }
}

impl<T: Poolable> ObjectFactory for FnFactory<T> {
    type Object = T;

    fn create(&self) -> Result<T, FactoryError> {
        (self.create)()
    }

    fn retire(&self, object: T) -> Result<(), FactoryError> {
        match self.retire {
            Some(ref retire) => retire(object),
            None => Ok(()),
        }
    }
}

impl<T> fmt::Debug for FnFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory")
            .field("retire_hook", &self.retire.is_some())
            .finish()
    }
}
