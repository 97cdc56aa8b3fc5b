use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Key shared by every request that should see the same cached data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum CacheKey {
    Text(String),
    Number(i64),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Text(text) => write!(f, "{text}"),
            CacheKey::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        CacheKey::Text(value.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        CacheKey::Text(value)
    }
}

impl From<i64> for CacheKey {
    fn from(value: i64) -> Self {
        CacheKey::Number(value)
    }
}

impl From<i32> for CacheKey {
    fn from(value: i32) -> Self {
        CacheKey::Number(i64::from(value))
    }
}

/// Lifetime of a cache entry or of its freshness window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Never expires / always fresh. Encoded as `-1` in millisecond configs.
    Infinite,
    Finite(Duration),
}

impl Ttl {
    /// Decodes the millisecond encoding where any negative value means "infinite".
    pub fn from_millis(millis: i64) -> Self {
        if millis < 0 {
            Ttl::Infinite
        } else {
            Ttl::Finite(Duration::from_millis(millis as u64))
        }
    }

    /// True when `age` is still inside the window.
    pub fn covers(&self, age: Duration) -> bool {
        match self {
            Ttl::Infinite => true,
            Ttl::Finite(limit) => age < *limit,
        }
    }
}

/// Upper bound on a repeated action such as retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Encoded as `-1` in configs.
    Unlimited,
    AtMost(u32),
}

impl Limit {
    pub fn from_count(count: i64) -> Self {
        if count < 0 {
            Limit::Unlimited
        } else {
            Limit::AtMost(u32::try_from(count).unwrap_or(u32::MAX))
        }
    }

    /// True when `count` attempts have not exceeded the bound.
    pub fn allows(&self, count: u32) -> bool {
        match self {
            Limit::Unlimited => true,
            Limit::AtMost(max) => count <= *max,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Limit::AtMost(0))
    }
}
