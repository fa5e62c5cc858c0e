use std::cmp::Ordering;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};

/// 由字符串内容哈希得到的资源标识
///
/// 相等与排序只比较哈希值，原始字符串仅用于 debug name。
/// 默认值（哈希为 0）表示无效的 Guid。
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Guid {
    hash: u64,
    name: String,
}

impl Guid {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut hasher = DefaultHasher::new();
        name.as_bytes().hash(&mut hasher);
        Self {
            hash: hasher.finish(),
            name,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.hash != 0
    }

    #[inline]
    pub fn hash_value(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<String> for Guid {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Guid {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Guid> for String {
    fn from(value: Guid) -> Self {
        value.name
    }
}

impl PartialEq for Guid {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}
impl Eq for Guid {}

impl Hash for Guid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl PartialOrd for Guid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Guid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hash.cmp(&other.hash)
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({:?}, {:#018x})", self.name, self.hash)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_string_same_guid() {
        let a = Guid::new("input_tensor");
        let b = Guid::from("input_tensor");
        assert_eq!(a, b);
        assert_eq!(a.hash_value(), b.hash_value());
        assert!(a.is_valid());
        assert_ne!(a, Guid::new("output_tensor"));
    }

    #[test]
    fn test_default_is_invalid() {
        let guid = Guid::default();
        assert!(!guid.is_valid());
        assert_eq!(guid.name(), "");
    }

    #[test]
    fn test_deserialize_from_string() {
        let guid: Guid = serde_json::from_str("\"weights\"").unwrap();
        assert_eq!(guid, Guid::new("weights"));
        assert_eq!(guid.to_string(), "weights");
        assert_eq!(serde_json::to_string(&guid).unwrap(), "\"weights\"");
    }
}
