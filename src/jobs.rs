//! 内置演示作业

use std::time::Duration;

use batch_core::{BatchResult, EngineConfig, TaskError, TaskResult};
use batch_domain::{
    ChunkStep, FnItemProcessor, FnItemWriter, FnTasklet, Job, JobRegistry, Processed, Step,
    StepContext,
};
use tracing::info;

/// 模拟耗时工作的简单步骤
fn timed_step(name: &str, config: &EngineConfig) -> Step {
    Step::simple(
        name,
        FnTasklet::new(|context: StepContext| async move {
            info!("执行步骤 {}", context.step_name);
            tokio::time::sleep(Duration::from_secs(1)).await;
            info!("步骤 {} 完成", context.step_name);
            TaskResult::Ok(())
        }),
    )
    .build_with(config)
}

fn error_step(config: &EngineConfig) -> Step {
    Step::simple(
        "ErrorStep",
        FnTasklet::new(|_: StepContext| async {
            Err::<(), _>(TaskError::new("Something went wrong!"))
        }),
    )
    .build_with(config)
}

/// 1..=50 取平方，丢弃奇数平方，每10条提交一次
fn squares_step(config: &EngineConfig) -> BatchResult<Step> {
    let chunk = ChunkStep::builder()
        .list_reader((1..=50).collect::<Vec<i64>>())
        .processor(FnItemProcessor::new(|n: i64| {
            let square = n * n;
            Ok(Processed::from((square % 2 == 0).then_some(square)))
        }))
        .writer(FnItemWriter::new(|items: &[i64]| {
            info!("写入 {} 条: {:?}", items.len(), items);
            Ok(())
        }))
        .chunk_size(10)
        .build_with(config)?;

    Ok(Step::chunk("SquaresStep", chunk).build_with(config))
}

/// 构建作业目录：SampleJob, FailingJob, SquaresJob
pub fn demo_registry(config: &EngineConfig) -> BatchResult<JobRegistry> {
    JobRegistry::builder()
        .register(
            Job::new("SampleJob")
                .step(timed_step("Step1", config))
                .step(timed_step("Step2", config)),
        )
        .register(
            Job::new("FailingJob")
                .step(timed_step("Step1", config))
                .step(error_step(config)),
        )
        .register(Job::new("SquaresJob").step(squares_step(config)?))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_registry_contents() {
        let registry = demo_registry(&EngineConfig::default()).unwrap();
        assert_eq!(
            registry.job_names(),
            vec!["FailingJob", "SampleJob", "SquaresJob"]
        );

        let squares = registry.lookup("SquaresJob").unwrap();
        assert_eq!(squares.steps[0].chunk_size(), Some(10));

        let failing = registry.lookup("FailingJob").unwrap();
        assert_eq!(failing.step_names(), vec!["Step1", "ErrorStep"]);
    }
}
