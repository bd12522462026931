use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

/// Services shared by every module of a session, looked up by type.
#[derive(Default, Clone)]
pub struct ServiceRegistry {
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ServiceRegistry {
    pub fn insert<T: Any + Send + Sync>(&mut self, service: Arc<T>) {
        self.services.insert(TypeId::of::<T>(), service);
    }

    /// Missing services are logged and reported as `None`; callers carry on without them.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let found = self
            .services
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|service| service.downcast::<T>().ok());
        if found.is_none() {
            warn!(service = type_name::<T>(), "service not registered");
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeter(&'static str);

    #[test]
    fn resolves_by_type() {
        let mut registry = ServiceRegistry::default();
        registry.insert(Arc::new(Greeter("hi")));
        assert_eq!(registry.get::<Greeter>().map(|g| g.0), Some("hi"));
        assert!(registry.get::<String>().is_none());
    }
}
