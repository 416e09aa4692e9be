//! Executable lookup on the search path.

/// Answers "is this program on `$PATH`?".
pub trait ExecutableLookup: Send + Sync {
    fn exists(&self, name: &str) -> bool;
}

/// [`ExecutableLookup`] backed by the `which` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathLookup;

impl ExecutableLookup for PathLookup {
    fn exists(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }
}

/// In-memory lookup for tests.  Programs can be "installed" after creation.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FakeLookup {
    present: std::sync::Mutex<std::collections::HashSet<String>>,
}

#[cfg(test)]
impl FakeLookup {
    pub fn with(names: &[&str]) -> Self {
        let lookup = Self::default();
        for name in names {
            lookup.install(name);
        }
        lookup
    }

    pub fn install(&self, name: &str) {
        self.present.lock().unwrap().insert(name.to_string());
    }
}

#[cfg(test)]
impl ExecutableLookup for FakeLookup {
    fn exists(&self, name: &str) -> bool {
        self.present.lock().unwrap().contains(name)
    }
}
