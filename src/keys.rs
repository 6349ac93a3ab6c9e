use std::fmt::Debug;

/// Trait for types that can contribute a segment of a cache key.
///
/// The blanket implementation renders the value through its `Debug`
/// representation. `Debug` quoting keeps adjacent string parameters from
/// colliding: `("ab", "c")` renders as `"ab"/"c"` while `("a", "bc")`
/// renders as `"a"/"bc"`.
///
/// Implement this trait directly when a type's `Debug` output is unstable or
/// too verbose to serve as a key segment.
pub trait CacheableKey {
    fn to_key_part(&self) -> String;
}

impl<T> CacheableKey for T
where
    T: Debug + ?Sized,
{
    fn to_key_part(&self) -> String {
        format!("{:?}", self)
    }
}

/// Builds a deterministic cache key from a prefix and an ordered list of
/// parameter segments.
///
/// Two calls with the same prefix and the same parts in the same order yield
/// identical keys; differing parts yield differing keys. Parameter order is
/// significant.
///
/// # Examples
///
/// ```
/// use requery::cache_key;
///
/// let a = cache_key("jobs", &[&"engineering", &42u32]);
/// let b = cache_key("jobs", &[&"engineering", &42u32]);
/// assert_eq!(a, b);
///
/// let c = cache_key("jobs", &[&42u32, &"engineering"]);
/// assert_ne!(a, c);
/// ```
pub fn cache_key(prefix: &str, parts: &[&dyn CacheableKey]) -> String {
    let mut key = String::from(prefix);
    for part in parts {
        key.push('/');
        key.push_str(&part.to_key_part());
    }
    key
}
