use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Expiring lookup cache for immutable-by-key metadata such as task
/// definitions. Eviction is lazy: an expired entry is dropped by the `get`
/// that observes it. A zero TTL disables caching entirely.
///
/// Not synchronized; the refresh worker is the only owner and at most one
/// fetch cycle touches the cache at a time.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: HashMap<String, (V, Instant)>,
}

impl<V> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), (value, Instant::now()));
    }

    pub fn get(&mut self, key: &str) -> Option<&V> {
        match self.entries.get(key) {
            Some((_, created_at)) if created_at.elapsed() >= self.ttl => {
                self.entries.remove(key);
                None
            }
            Some(_) => self.entries.get(key).map(|(value, _)| value),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_returns_value() {
        let mut cache = TtlCache::new(Duration::from_secs(300));
        cache.set("arn:task-def:1", "web:5");
        assert_eq!(cache.get("arn:task-def:1"), Some(&"web:5"));
    }

    #[test]
    fn get_missing_key_returns_none() {
        let mut cache: TtlCache<String> = TtlCache::new(Duration::from_secs(300));
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let mut cache = TtlCache::new(Duration::from_millis(5));
        cache.set("arn:task-def:1", "web:5");
        assert_eq!(cache.get("arn:task-def:1"), Some(&"web:5"));

        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(cache.get("arn:task-def:1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_ttl_disables_caching() {
        let mut cache = TtlCache::new(Duration::ZERO);
        cache.set("arn:task-def:1", "web:5");
        assert_eq!(cache.get("arn:task-def:1"), None);
    }
}
