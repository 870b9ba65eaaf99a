use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Interned name of a target, category or endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(u32);

impl From<u32> for KeyId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl From<KeyId> for u32 {
    fn from(v: KeyId) -> Self {
        v.0
    }
}

#[derive(Default, Debug)]
pub struct Interner {
    map: RwLock<HashMap<Arc<str>, u32>>,
    vec: RwLock<Vec<Arc<str>>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_intern(&self, s: &str) -> KeyId {
        {
            let map = self.map.read();
            if let Some(&id) = map.get(s) {
                return KeyId(id);
            }
        }

        let mut map = self.map.write();
        let mut vec = self.vec.write();

        // Another writer may have won the race between the two locks.
        if let Some(&id) = map.get(s) {
            return KeyId(id);
        }

        let id = vec.len() as u32;
        let s: Arc<str> = Arc::from(s);
        vec.push(s.clone());
        map.insert(s, id);

        KeyId(id)
    }

    pub fn get(&self, s: &str) -> Option<KeyId> {
        self.map.read().get(s).map(|&id| KeyId(id))
    }

    pub fn resolve(&self, id: KeyId) -> Option<Arc<str>> {
        let vec = self.vec.read();
        vec.get(id.0 as usize).cloned()
    }

    /// Resolves `id`, falling back to an empty name for ids this interner never issued.
    pub(crate) fn name(&self, id: KeyId) -> String {
        self.resolve(id).map(|s| s.to_string()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interner_returns_stable_ids() {
        let interner = Interner::new();
        let a = interner.get_or_intern("swoole");
        let b = interner.get_or_intern("frankenphp");
        assert_ne!(a, b);
        assert_eq!(interner.get_or_intern("swoole"), a);
        assert_eq!(interner.get("frankenphp"), Some(b));
        assert_eq!(interner.get("php-fpm"), None);
        assert_eq!(interner.resolve(a).as_deref(), Some("swoole"));
    }

    #[test]
    fn interner_is_consistent_across_threads() {
        let interner = Interner::new();
        let ids: Vec<KeyId> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| interner.get_or_intern("shared")))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|_| panic!("interner thread panicked")))
                .collect()
        });

        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }
}
