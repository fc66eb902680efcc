use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use batch_core::{BatchError, BatchResult};
use tracing::info;

use crate::job::Job;

/// 只读作业目录，启动时构建一次，之后通过 `Arc` 共享，无需加锁
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<String, Arc<Job>>,
}

impl JobRegistry {
    pub fn builder() -> JobRegistryBuilder {
        JobRegistryBuilder::default()
    }

    pub fn lookup(&self, name: &str) -> BatchResult<Arc<Job>> {
        self.jobs
            .get(name)
            .cloned()
            .ok_or_else(|| BatchError::job_not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    /// 按名称排序
    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[derive(Default)]
pub struct JobRegistryBuilder {
    jobs: Vec<Job>,
}

impl JobRegistryBuilder {
    pub fn register(mut self, job: Job) -> Self {
        self.jobs.push(job);
        self
    }

    /// 校验并冻结目录
    pub fn build(self) -> BatchResult<JobRegistry> {
        let mut jobs = HashMap::with_capacity(self.jobs.len());

        for job in self.jobs {
            validate_job(&job)?;
            if jobs.contains_key(&job.name) {
                return Err(BatchError::config_error(format!(
                    "作业重复注册: {}",
                    job.name
                )));
            }
            jobs.insert(job.name.clone(), Arc::new(job));
        }

        info!("作业目录构建完成，共 {} 个作业", jobs.len());
        Ok(JobRegistry { jobs })
    }
}

fn validate_job(job: &Job) -> BatchResult<()> {
    if job.name.trim().is_empty() {
        return Err(BatchError::config_error("作业名称不能为空"));
    }
    if job.steps.is_empty() {
        return Err(BatchError::config_error(format!(
            "作业 {} 至少需要一个步骤",
            job.name
        )));
    }

    let mut seen = HashSet::new();
    for step in &job.steps {
        if step.name.trim().is_empty() {
            return Err(BatchError::config_error(format!(
                "作业 {} 中存在空的步骤名称",
                job.name
            )));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(BatchError::config_error(format!(
                "作业 {} 中步骤名称重复: {}",
                job.name, step.name
            )));
        }
        if step.chunk_size() == Some(0) {
            return Err(BatchError::config_error(format!(
                "步骤 {}.{} 的块大小必须大于0",
                job.name, step.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Step;
    use crate::tasklet::{FnTasklet, StepContext};
    use batch_core::TaskResult;

    fn step(name: &str) -> Step {
        Step::simple(
            name,
            FnTasklet::new(|_: StepContext| async { TaskResult::Ok(()) }),
        )
        .build()
    }

    #[test]
    fn test_lookup() {
        let registry = JobRegistry::builder()
            .register(Job::new("b").step(step("s1")))
            .register(Job::new("a").step(step("s1")).step(step("s2")))
            .build()
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.job_names(), vec!["a", "b"]);
        assert_eq!(registry.lookup("a").unwrap().steps.len(), 2);

        let err = registry.lookup("missing").unwrap_err();
        assert!(matches!(err, BatchError::JobNotFound { ref name } if name == "missing"));
    }

    #[test]
    fn test_rejects_duplicate_job() {
        let result = JobRegistry::builder()
            .register(Job::new("dup").step(step("s")))
            .register(Job::new("dup").step(step("s")))
            .build();
        assert!(matches!(result, Err(BatchError::Configuration(_))));
    }

    #[test]
    fn test_rejects_invalid_steps() {
        let duplicate_step = JobRegistry::builder()
            .register(Job::new("j").step(step("s")).step(step("s")))
            .build();
        assert!(duplicate_step.is_err());

        let no_steps = JobRegistry::builder().register(Job::new("empty")).build();
        assert!(no_steps.is_err());

        let blank_name = JobRegistry::builder()
            .register(Job::new(" ").step(step("s")))
            .build();
        assert!(blank_name.is_err());
    }
}
