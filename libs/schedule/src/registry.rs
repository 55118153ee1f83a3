//! Handler registry.
//!
//! The registry is plain owned data. Applications build it while they are
//! being defined and hand it to the deploy, teardown and serve entry points.

use crate::descriptor::{JobDescriptor, JobScope, ScheduleOptions};
use crate::error::ScheduleError;

/// A registered job and the handler it triggers.
#[derive(Debug, Clone)]
pub struct Registration<H> {
    descriptor: JobDescriptor,
    handler: H,
}

impl<H> Registration<H> {
    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_parts(self) -> (JobDescriptor, H) {
        (self.descriptor, self.handler)
    }
}

/// Insertion-ordered mapping from job name to `(descriptor, handler)`.
#[derive(Debug, Clone)]
pub struct HandlerRegistry<H> {
    scope: JobScope,
    entries: Vec<Registration<H>>,
}

impl<H> HandlerRegistry<H> {
    /// Create an empty registry whose jobs live in `scope`.
    pub fn new(scope: JobScope) -> Self {
        Self {
            scope,
            entries: Vec::new(),
        }
    }

    pub fn scope(&self) -> &JobScope {
        &self.scope
    }

    /// Register a job.
    ///
    /// Names are unique within a registry: a second registration under the
    /// same name fails with [`ScheduleError::DuplicateJob`] and leaves the
    /// first one untouched.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        cron_expression: impl Into<String>,
        options: ScheduleOptions,
        handler: H,
    ) -> Result<&JobDescriptor, ScheduleError> {
        let name = name.into();
        if self.position(&name).is_some() {
            return Err(ScheduleError::DuplicateJob(name));
        }

        let descriptor = JobDescriptor::new(self.scope.clone(), name, cron_expression, options)?;
        self.entries.push(Registration {
            descriptor,
            handler,
        });

        let last = self.entries.len() - 1;
        Ok(&self.entries[last].descriptor)
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> Vec<&JobDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Remove a job, returning its registration.
    pub fn remove(&mut self, name: &str) -> Result<Registration<H>, ScheduleError> {
        match self.position(name) {
            Some(index) => Ok(self.entries.remove(index)),
            None => Err(ScheduleError::JobNotFound(name.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Registration<H>> {
        self.position(name).map(|index| &self.entries[index])
    }

    pub fn handler(&self, name: &str) -> Option<&H> {
        self.get(name).map(Registration::handler)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registration<H>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.descriptor.name() == name)
    }
}
