use std::sync::Arc;

use batch_core::{BatchResult, ExecutionRepository, JobInstance};
use batch_domain::JobParameters;
use tracing::{debug, info};

/// 把 (作业名, 参数签名) 映射到持久化的作业实例
#[derive(Clone)]
pub struct JobInstanceResolver {
    repository: Arc<dyn ExecutionRepository>,
}

impl JobInstanceResolver {
    pub fn new(repository: Arc<dyn ExecutionRepository>) -> Self {
        Self { repository }
    }

    /// 返回 (实例, 是否新建)
    ///
    /// 并发的首次解析由仓储的原子创建保证只产生一个实例。
    pub async fn resolve(
        &self,
        job_name: &str,
        parameters: &JobParameters,
    ) -> BatchResult<(JobInstance, bool)> {
        let job_key = parameters.signature();

        if let Some(instance) = self.repository.find_instance(job_name, &job_key).await? {
            debug!("复用作业实例 {} ({})", instance.id, job_name);
            return Ok((instance, false));
        }

        let (instance, created) = self
            .repository
            .create_instance_if_absent(job_name, &job_key, &parameters.to_vec())
            .await?;

        if created {
            info!("创建作业实例 {} ({}), 签名: {}", instance.id, job_name, job_key);
        } else {
            debug!("并发创建中复用作业实例 {} ({})", instance.id, job_name);
        }

        Ok((instance, created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batch_infrastructure::InMemoryExecutionRepository;

    fn resolver() -> (JobInstanceResolver, Arc<InMemoryExecutionRepository>) {
        let repository = Arc::new(InMemoryExecutionRepository::new());
        (JobInstanceResolver::new(repository.clone()), repository)
    }

    #[tokio::test]
    async fn test_same_parameters_same_instance() {
        let (resolver, _) = resolver();
        let params = JobParameters::from_raw([("date", "2024-01-01"), ("run", "1")]).unwrap();

        let (first, first_new) = resolver.resolve("job", &params).await.unwrap();
        let (second, second_new) = resolver.resolve("job", &params).await.unwrap();

        assert!(first_new);
        assert!(!second_new);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_distinct_parameters_and_jobs() {
        let (resolver, _) = resolver();
        let p1 = JobParameters::from_raw([("run", "1")]).unwrap();
        let p2 = JobParameters::from_raw([("run", "2")]).unwrap();

        let (a, _) = resolver.resolve("job", &p1).await.unwrap();
        let (b, _) = resolver.resolve("job", &p2).await.unwrap();
        let (c, _) = resolver.resolve("other", &p1).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[tokio::test]
    async fn test_parameters_persisted_with_instance() {
        let (resolver, repository) = resolver();
        let params = JobParameters::from_raw([("b", "2.5"), ("a", "text")]).unwrap();

        let (instance, _) = resolver.resolve("job", &params).await.unwrap();
        let stored = repository.get_parameters(instance.id).await.unwrap();

        assert_eq!(stored, params.to_vec());
        assert_eq!(stored[0].key, "a");
    }
}
