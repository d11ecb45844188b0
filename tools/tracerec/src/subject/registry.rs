use crate::subject::builtin::{Echo, Raise};
use crate::subject::Subject;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
pub struct SubjectRegistry {
    subjects: BTreeMap<String, Arc<dyn Subject>>,
}

impl SubjectRegistry {
    pub fn with_defaults() -> Self {
        let mut this = Self::default();
        this.register(Arc::new(Echo));
        this.register(Arc::new(Raise));
        this
    }

    pub fn register(&mut self, subject: Arc<dyn Subject>) {
        self.subjects.insert(subject.name().to_string(), subject);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Subject>> {
        self.subjects.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.subjects.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::SubjectRegistry;

    #[test]
    fn registry_registers_builtin_subjects() {
        let registry = SubjectRegistry::with_defaults();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("raise").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["echo", "raise"]);
    }
}
