//! Stale-while-revalidate for a batch of named queries.
//!
//! The batch is cached as one unit: while any member is loading, the whole
//! previously completed batch stands in for it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheWrite, RevalidationCache};
use crate::evaluation::{Evaluation, ValueSource};
use crate::key::{derive_batch_key, FunctionReference, QueryKey, QueryRef};
use crate::loading::Loadable;
use crate::QueryError;

/// One named member of a [`QueryBatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Function to subscribe to.
    pub function: FunctionReference,
    /// Arguments, already encoded as JSON.
    pub args: Value,
}

/// Ordered set of named query declarations.
///
/// Names keep their first declaration position; inserting an existing name
/// replaces its declaration in place. The composite key follows declaration
/// order, so declare members in a stable order.
///
/// # Example
///
/// ```
/// use query_swr::{FunctionReference, QueryBatch};
/// use serde_json::json;
///
/// let batch = QueryBatch::new()
///     .with("user", FunctionReference::new("users:get"), &json!({ "id": 7 }))?
///     .with("feed", FunctionReference::new("feed:list"), &json!({ "limit": 20 }))?;
/// assert_eq!(batch.names().collect::<Vec<_>>(), ["user", "feed"]);
/// # Ok::<(), query_swr::QueryError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBatch {
    entries: Vec<(String, BatchEntry)>,
}

impl QueryBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` as `function` applied to `args`.
    pub fn insert<A>(
        &mut self,
        name: impl Into<String>,
        function: FunctionReference,
        args: &A,
    ) -> Result<(), QueryError>
    where
        A: Serialize + ?Sized,
    {
        let args = serde_json::to_value(args).map_err(QueryError::unserializable)?;
        let name = name.into();
        let entry = BatchEntry { function, args };
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((name, entry)),
        }
        Ok(())
    }

    /// Declare a typed query.
    pub fn insert_query<A: Serialize, T>(
        &mut self,
        name: impl Into<String>,
        query: &QueryRef<A, T>,
        args: &A,
    ) -> Result<(), QueryError> {
        self.insert(name, query.function().clone(), args)
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<A>(
        mut self,
        name: impl Into<String>,
        function: FunctionReference,
        args: &A,
    ) -> Result<Self, QueryError>
    where
        A: Serialize + ?Sized,
    {
        self.insert(name, function, args)?;
        Ok(self)
    }

    /// Look up a declaration.
    pub fn get(&self, name: &str) -> Option<&BatchEntry> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entry)| entry)
    }

    /// Declarations in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BatchEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Member names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the batch has no members.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Composite cache key of the whole batch.
    pub fn key(&self) -> Result<QueryKey, QueryError> {
        derive_batch_key(
            self.entries
                .iter()
                .map(|(name, entry)| (name.as_str(), &entry.function, &entry.args)),
        )
    }
}

/// Per-member results of a batch subscription, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResults {
    entries: Vec<(String, Loadable<Value>)>,
}

impl BatchResults {
    /// Create an empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the state of `name`, replacing any earlier state in place.
    pub fn insert(&mut self, name: impl Into<String>, state: Loadable<Value>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = state,
            None => self.entries.push((name, state)),
        }
    }

    /// State of `name`, if it is part of the batch.
    pub fn get(&self, name: &str) -> Option<&Loadable<Value>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, state)| state)
    }

    /// Decode the value of `name` as `T`.
    ///
    /// Returns `Ok(None)` while the member is loading or absent.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, QueryError> {
        match self.get(name) {
            Some(Loadable::Ready(value)) => T::deserialize(value).map(Some).map_err(|err| {
                QueryError::UnexpectedResultShape {
                    name: name.to_owned(),
                    message: err.to_string(),
                }
            }),
            _ => Ok(None),
        }
    }

    /// True iff any member is still loading.
    pub fn is_loading(&self) -> bool {
        self.entries.iter().any(|(_, state)| state.is_loading())
    }

    /// Members in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Loadable<Value>)> {
        self.entries.iter().map(|(name, state)| (name.as_str(), state))
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no members.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, Loadable<Value>)> for BatchResults {
    fn from_iter<I: IntoIterator<Item = (N, Loadable<Value>)>>(iter: I) -> Self {
        let mut results = BatchResults::new();
        for (name, state) in iter {
            results.insert(name, state);
        }
        results
    }
}

/// Combine a live batch with the cache.
///
/// - No member loading: return the batch and schedule it to be stored under
///   `key` as a whole.
/// - Any member loading: return the cached batch if there is one, otherwise
///   the partially loaded live batch.
pub fn evaluate(
    cache: &RevalidationCache,
    key: &QueryKey,
    live: BatchResults,
) -> Evaluation<BatchResults> {
    if !live.is_loading() {
        return Evaluation {
            commit: Some(CacheWrite::new(key.clone(), live.clone())),
            value: live,
            source: ValueSource::Live,
        };
    }

    match cache.get::<BatchResults>(key) {
        Some(cached) => {
            cache.trace_stale(key);
            Evaluation {
                value: cached,
                source: ValueSource::Cache,
                commit: None,
            }
        }
        None => Evaluation {
            value: live,
            source: ValueSource::Loading,
            commit: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn batch(user_id: u32) -> QueryBatch {
        QueryBatch::new()
            .with("user", FunctionReference::new("users:get"), &json!({ "id": user_id }))
            .unwrap()
            .with("feed", FunctionReference::new("feed:list"), &json!({ "limit": 2 }))
            .unwrap()
    }

    fn results(user: Loadable<Value>, feed: Loadable<Value>) -> BatchResults {
        [("user", user), ("feed", feed)].into_iter().collect()
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut batch = batch(1);
        batch
            .insert("user", FunctionReference::new("users:get"), &json!({ "id": 2 }))
            .unwrap();
        assert_eq!(batch.names().collect::<Vec<_>>(), ["user", "feed"]);
        assert_eq!(batch.get("user").unwrap().args, json!({ "id": 2 }));
        assert_eq!(batch.key().unwrap(), self::batch(2).key().unwrap());
    }

    #[test]
    fn test_is_loading_if_any_member_loads() {
        let partial = results(Loadable::Ready(json!({ "name": "ada" })), Loadable::Loading);
        assert!(partial.is_loading());
        let complete = results(Loadable::Ready(json!(null)), Loadable::Ready(json!([])));
        assert!(!complete.is_loading());
        assert!(!BatchResults::new().is_loading());
    }

    #[test]
    fn test_complete_batch_is_cached_whole() {
        let cache = RevalidationCache::new();
        let key = batch(1).key().unwrap();
        let live = results(Loadable::Ready(json!({ "name": "ada" })), Loadable::Ready(json!([1, 2])));

        let value = evaluate(&cache, &key, live.clone()).finish(&cache);
        assert_eq!(value, live);
        assert_eq!(cache.get::<BatchResults>(&key), Some(live));
    }

    #[test]
    fn test_partial_batch_serves_cached_batch() {
        let cache = RevalidationCache::new();
        let key = batch(1).key().unwrap();
        let complete = results(Loadable::Ready(json!({ "name": "ada" })), Loadable::Ready(json!([1, 2])));
        cache.set(&key, complete.clone());

        let partial = results(Loadable::Ready(json!({ "name": "grace" })), Loadable::Loading);
        let eval = evaluate(&cache, &key, partial);
        assert!(eval.is_stale());
        assert!(eval.commit.is_none());
        assert_eq!(eval.value, complete);
    }

    #[test]
    fn test_partial_batch_without_cache_is_live() {
        let cache = RevalidationCache::new();
        let key = batch(1).key().unwrap();
        let partial = results(Loadable::Ready(json!({ "name": "grace" })), Loadable::Loading);

        let eval = evaluate(&cache, &key, partial.clone());
        assert_eq!(eval.source, ValueSource::Loading);
        assert_eq!(eval.value, partial);
    }

    #[test]
    fn test_get_as() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct User {
            name: String,
        }

        let results = results(Loadable::Ready(json!({ "name": "ada" })), Loadable::Loading);
        assert_eq!(
            results.get_as::<User>("user").unwrap(),
            Some(User { name: "ada".into() })
        );
        assert_eq!(results.get_as::<User>("feed").unwrap(), None);
        assert_eq!(results.get_as::<User>("missing").unwrap(), None);

        let err = results.get_as::<Vec<u32>>("user").unwrap_err();
        assert!(matches!(err, QueryError::UnexpectedResultShape { ref name, .. } if name == "user"));
    }
}
