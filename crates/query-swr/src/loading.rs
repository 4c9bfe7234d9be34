//! The "no data yet" sentinel.

/// Result of a live subscription: either the loading sentinel or a value.
///
/// A subscription emits `Loading` before it has ever produced a value for
/// its current arguments. The SWR wrappers replace that sentinel with the last
/// known-good value for the same key when one is cached.
///
/// # Example
///
/// ```
/// use query_swr::Loadable;
///
/// let state: Loadable<u32> = Loadable::Ready(3);
/// assert_eq!(state.get(), Some(&3));
/// assert!(Loadable::<u32>::Loading.is_loading());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Loadable<T> {
    /// No data yet.
    Loading,
    /// A value delivered by the subscription (or served from cache).
    Ready(T),
}

impl<T> Loadable<T> {
    /// Check if this is the loading sentinel.
    pub fn is_loading(&self) -> bool {
        matches!(self, Loadable::Loading)
    }

    /// Check if a value is available.
    pub fn is_ready(&self) -> bool {
        matches!(self, Loadable::Ready(_))
    }

    /// Get the value if ready, None if loading.
    pub fn get(&self) -> Option<&T> {
        match self {
            Loadable::Ready(v) => Some(v),
            Loadable::Loading => None,
        }
    }

    /// Get the value if ready, None if loading (consuming version).
    pub fn into_inner(self) -> Option<T> {
        match self {
            Loadable::Ready(v) => Some(v),
            Loadable::Loading => None,
        }
    }

    /// Borrow the inner value.
    pub fn as_ref(&self) -> Loadable<&T> {
        match self {
            Loadable::Ready(v) => Loadable::Ready(v),
            Loadable::Loading => Loadable::Loading,
        }
    }

    /// Map the ready value, keeping the sentinel as is.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Loadable<U> {
        match self {
            Loadable::Ready(v) => Loadable::Ready(f(v)),
            Loadable::Loading => Loadable::Loading,
        }
    }
}

impl<T> Default for Loadable<T> {
    fn default() -> Self {
        Loadable::Loading
    }
}

impl<T> From<Option<T>> for Loadable<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Loadable::Ready(v),
            None => Loadable::Loading,
        }
    }
}
