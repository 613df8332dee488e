/// Per-job execution context handed over by the scheduler
use seqport_core::Container;
use std::path::{Path, PathBuf};
use tracing::{info_span, Span};

/// Work directory, owning container and a logging span for one ingestion job.
///
/// Everything the job logs is emitted inside [`JobContext::span`], so log lines carry the job id
/// and container without threading a logger through every call.
#[derive(Debug, Clone)]
pub struct JobContext {
    job_id: String,
    container: Container,
    work_dir: PathBuf,
    span: Span,
}

impl JobContext {
    pub fn new(
        job_id: impl Into<String>,
        container: Container,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        let job_id = job_id.into();
        let span = info_span!(
            "import",
            job = %job_id,
            container = %container.name
        );
        Self {
            job_id,
            container,
            work_dir: work_dir.into(),
            span,
        }
    }

    /// A context with a freshly generated job id
    pub fn generate(container: Container, work_dir: impl Into<PathBuf>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), container, work_dir)
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        self.span.in_scope(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqport_core::ContainerId;

    #[test]
    fn test_generated_ids_differ() {
        let container = Container {
            id: ContainerId::new(1),
            name: "Lab".to_string(),
            parent: None,
            pipeline_root: PathBuf::from("/pipeline"),
        };
        let a = JobContext::generate(container.clone(), "/work/a");
        let b = JobContext::generate(container, "/work/b");
        assert_ne!(a.job_id(), b.job_id());
        assert_eq!(a.work_dir(), Path::new("/work/a"));
        assert_eq!(a.in_scope(|| 41 + 1), 42);
    }
}
