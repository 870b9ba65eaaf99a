use crate::error::{Error, Result};

/// A named backend under comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    /// Absolute `http://` URL without a trailing slash.
    pub base_address: String,
}

impl Target {
    /// Joins the base address and `path`, collapsing a doubled slash at the seam.
    pub fn url_for(&self, path: &str) -> String {
        match (self.base_address.ends_with('/'), path.starts_with('/')) {
            (true, true) => format!("{}{}", self.base_address, &path[1..]),
            (false, false) if !path.is_empty() => format!("{}/{}", self.base_address, path),
            _ => format!("{}{}", self.base_address, path),
        }
    }
}

/// Ordered set of targets; read-only once the run starts.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: Vec<Target>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, base_address: &str) -> Result<&Target> {
        if self.targets.iter().any(|t| t.name == name) {
            return Err(Error::DuplicateTarget(name.to_string()));
        }

        let invalid = || Error::InvalidTargetAddress {
            name: name.to_string(),
            address: base_address.to_string(),
        };
        let parsed = url::Url::parse(base_address).map_err(|_| invalid())?;
        if parsed.scheme() != "http" || parsed.host_str().is_none() {
            return Err(invalid());
        }

        let idx = self.targets.len();
        self.targets.push(Target {
            name: name.to_string(),
            base_address: base_address.trim_end_matches('/').to_string(),
        });
        Ok(&self.targets[idx])
    }

    pub fn resolve(&self, name: &str) -> Result<&Target> {
        self.targets
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::UnknownTarget(name.to_string()))
    }

    /// Targets in registration order.
    pub fn all(&self) -> &[Target] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rejects_duplicate_names() {
        let mut reg = TargetRegistry::new();
        reg.register("swoole", "http://127.0.0.1:8001")
            .unwrap_or_else(|e| panic!("{e}"));
        match reg.register("swoole", "http://127.0.0.1:8002") {
            Err(Error::DuplicateTarget(name)) => assert_eq!(name, "swoole"),
            other => panic!("expected DuplicateTarget, got {other:?}"),
        }
    }

    #[test]
    fn register_rejects_non_http_addresses() {
        let mut reg = TargetRegistry::new();
        for bad in ["127.0.0.1:8001", "https://example.com", "not a url"] {
            assert!(matches!(
                reg.register("x", bad),
                Err(Error::InvalidTargetAddress { .. })
            ));
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn resolve_and_all_follow_registration_order() {
        let mut reg = TargetRegistry::new();
        for (name, port) in [("swoole", 8001), ("phpfpm", 8002), ("frankenphp", 8003)] {
            reg.register(name, &format!("http://127.0.0.1:{port}/"))
                .unwrap_or_else(|e| panic!("{e}"));
        }

        let names: Vec<&str> = reg.all().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["swoole", "phpfpm", "frankenphp"]);

        let t = reg.resolve("phpfpm").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(t.base_address, "http://127.0.0.1:8002");
        assert!(matches!(reg.resolve("hhvm"), Err(Error::UnknownTarget(_))));
    }

    #[test]
    fn url_for_joins_with_a_single_slash() {
        let t = Target {
            name: "swoole".to_string(),
            base_address: "http://127.0.0.1:8001".to_string(),
        };
        assert_eq!(t.url_for("/api/static"), "http://127.0.0.1:8001/api/static");
        assert_eq!(t.url_for("api/static"), "http://127.0.0.1:8001/api/static");

        let trailing = Target {
            base_address: "http://127.0.0.1:8001/".to_string(),
            ..t
        };
        assert_eq!(
            trailing.url_for("/api/static"),
            "http://127.0.0.1:8001/api/static"
        );
    }
}
