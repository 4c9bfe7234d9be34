//! Query identities and cache key derivation.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::QueryError;

/// Reference to a remotely-executable query function.
///
/// The path has the form `module[:export]`, where `module` is a `/`-separated
/// path. Two references are equal iff they resolve to the same canonical
/// name, so `"messages"`, `"messages:default"` and `"messages.js:default"`
/// all name the same function.
#[derive(Clone)]
pub struct FunctionReference {
    path: Cow<'static, str>,
}

impl FunctionReference {
    /// Create a reference from a static path.
    pub const fn new(path: &'static str) -> Self {
        Self {
            path: Cow::Borrowed(path),
        }
    }

    /// Create a reference from a path built at runtime.
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            path: Cow::Owned(path.into()),
        }
    }

    /// The path exactly as supplied.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolve the canonical `module:export` name.
    ///
    /// Fails with [`QueryError::InvalidIdentity`] when the path is empty,
    /// contains whitespace, has an empty module segment or export, or more
    /// than one `:` separator.
    pub fn canonical_name(&self) -> Result<String, QueryError> {
        let raw = self.path.as_ref();
        if raw.is_empty() {
            return Err(QueryError::invalid_identity(raw, "empty function path"));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(QueryError::invalid_identity(
                raw,
                "function path contains whitespace",
            ));
        }

        let (module, export) = match raw.split_once(':') {
            Some((_, export)) if export.contains(':') => {
                return Err(QueryError::invalid_identity(
                    raw,
                    "more than one `:` separator",
                ));
            }
            Some((_, "")) => {
                return Err(QueryError::invalid_identity(raw, "empty export name"));
            }
            Some((module, export)) => (module, export),
            None => (raw, "default"),
        };

        let module = module.strip_suffix(".js").unwrap_or(module);
        if module.is_empty() {
            return Err(QueryError::invalid_identity(raw, "empty module path"));
        }
        if module.split('/').any(str::is_empty) {
            return Err(QueryError::invalid_identity(
                raw,
                "empty module path segment",
            ));
        }

        Ok(format!("{module}:{export}"))
    }

    /// Canonical name when valid, raw path otherwise. Backs `Eq` and `Hash`.
    fn identity(&self) -> Cow<'_, str> {
        match self.canonical_name() {
            Ok(name) => Cow::Owned(name),
            Err(_) => Cow::Borrowed(self.path.as_ref()),
        }
    }
}

impl fmt::Debug for FunctionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionReference({:?})", self.path)
    }
}

impl PartialEq for FunctionReference {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for FunctionReference {}

impl Hash for FunctionReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

/// Typed query reference: a [`FunctionReference`] taking `A` and returning `T`.
///
/// For paginated queries `T` is the item type of a page.
///
/// ```
/// use query_swr::QueryRef;
///
/// #[derive(serde::Serialize)]
/// struct ListArgs {
///     page: u32,
/// }
///
/// const LIST_ITEMS: QueryRef<ListArgs, Vec<u32>> = QueryRef::new("items:list");
/// let key = LIST_ITEMS.key(&ListArgs { page: 1 }).unwrap();
/// assert_eq!(key.as_str(), r#"{"args":{"page":1},"query":"items:list"}"#);
/// ```
pub struct QueryRef<A, T> {
    function: FunctionReference,
    _marker: PhantomData<fn(&A) -> T>,
}

impl<A, T> QueryRef<A, T> {
    /// Create a typed reference from a static path.
    pub const fn new(path: &'static str) -> Self {
        Self {
            function: FunctionReference::new(path),
            _marker: PhantomData,
        }
    }

    /// Attach types to an untyped reference.
    pub fn from_function(function: FunctionReference) -> Self {
        Self {
            function,
            _marker: PhantomData,
        }
    }

    /// The untyped function reference.
    pub fn function(&self) -> &FunctionReference {
        &self.function
    }

    /// Derive the cache key for this query applied to `args`.
    pub fn key(&self, args: &A) -> Result<QueryKey, QueryError>
    where
        A: Serialize,
    {
        derive_key(&self.function, args)
    }
}

impl<A, T> Clone for QueryRef<A, T> {
    fn clone(&self) -> Self {
        Self::from_function(self.function.clone())
    }
}

impl<A, T> fmt::Debug for QueryRef<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryRef({:?})", self.function.path())
    }
}

impl<A, T> PartialEq for QueryRef<A, T> {
    fn eq(&self, other: &Self) -> bool {
        self.function == other.function
    }
}

impl<A, T> Eq for QueryRef<A, T> {}

/// Cache key for one (identity, arguments) pair or one batch declaration.
///
/// Cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Arc<str>);

impl QueryKey {
    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryKey({})", self.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for QueryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Derive the key for `function` applied to `args`.
///
/// The key is the compact JSON encoding of `{"args": .., "query": ..}` with
/// object keys sorted at every depth, so property order in `args` never
/// matters.
pub fn derive_key<A>(function: &FunctionReference, args: &A) -> Result<QueryKey, QueryError>
where
    A: Serialize + ?Sized,
{
    let name = function.canonical_name()?;
    let args = canonical_args(args)?;
    encode(key_object(name, args))
}

/// Derive the composite key of a batch from its declarations.
///
/// Declarations are encoded in the order given, so the same sub-queries
/// declared in a different order produce a different key.
pub fn derive_batch_key<'a, I>(declarations: I) -> Result<QueryKey, QueryError>
where
    I: IntoIterator<Item = (&'a str, &'a FunctionReference, &'a Value)>,
{
    let mut encoded = Vec::new();
    for (name, function, args) in declarations {
        let mut entry = key_object(function.canonical_name()?, canonicalize(args.clone()));
        entry.insert("name".to_owned(), Value::String(name.to_owned()));
        encoded.push(Value::Object(entry));
    }
    encode_value(&Value::Array(encoded))
}

/// Convert arguments to canonical JSON (object keys sorted recursively).
pub fn canonical_args<A>(args: &A) -> Result<Value, QueryError>
where
    A: Serialize + ?Sized,
{
    serde_json::to_value(args)
        .map(canonicalize)
        .map_err(QueryError::unserializable)
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

// Keys are inserted in sorted order so the encoding is stable even when
// serde_json's `preserve_order` feature is enabled elsewhere in the graph.
fn key_object(name: String, args: Value) -> Map<String, Value> {
    let mut entry = Map::new();
    entry.insert("args".to_owned(), args);
    entry.insert("query".to_owned(), Value::String(name));
    entry
}

fn encode(entry: Map<String, Value>) -> Result<QueryKey, QueryError> {
    encode_value(&Value::Object(entry))
}

fn encode_value(value: &Value) -> Result<QueryKey, QueryError> {
    let encoded = serde_json::to_string(value).map_err(QueryError::unserializable)?;
    Ok(QueryKey(Arc::from(encoded)))
}
