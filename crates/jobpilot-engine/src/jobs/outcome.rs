use serde::Serialize;

/// A job row seen during one discovery pass. `index` is only meaningful
/// within that pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub name: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub name: String,
    pub succeeded: bool,
}

/// Name → outcome mapping in invocation order.
///
/// Recording a name twice updates the existing entry in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct JobOutcomes {
    entries: Vec<JobOutcome>,
}

impl JobOutcomes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: impl Into<String>, succeeded: bool) {
        let name = name.into();
        match self.entries.iter_mut().find(|o| o.name == name) {
            Some(existing) => existing.succeeded = succeeded,
            None => self.entries.push(JobOutcome { name, succeeded }),
        }
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.succeeded)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JobOutcome> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|o| o.succeeded).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(|o| o.succeeded)
    }

    /// `(name, succeeded)` pairs in order.
    pub fn to_pairs(&self) -> Vec<(String, bool)> {
        self.entries
            .iter()
            .map(|o| (o.name.clone(), o.succeeded))
            .collect()
    }
}

impl<'a> IntoIterator for &'a JobOutcomes {
    type Item = &'a JobOutcome;
    type IntoIter = std::slice::Iter<'a, JobOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
