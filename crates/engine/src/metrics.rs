//! 引擎指标
//!
//! 通过 `metrics` 门面记录，未安装导出器时调用为空操作。

use batch_core::{BatchStatus, ChunkMetrics, StepExecution};
use ::metrics::{counter, histogram};

pub fn record_job_execution(job_name: &str, status: BatchStatus) {
    counter!(
        "batch_job_executions_total",
        "job" => job_name.to_string(),
        "status" => status.as_str()
    )
    .increment(1);
}

pub fn record_step_execution(job_name: &str, step: &StepExecution) {
    let outcome = if step.was_skipped() {
        "SKIPPED"
    } else {
        step.status.as_str()
    };
    counter!(
        "batch_step_executions_total",
        "job" => job_name.to_string(),
        "step" => step.step_name.clone(),
        "status" => outcome
    )
    .increment(1);

    if let Some(duration) = step.duration_ms() {
        histogram!("batch_step_duration_ms", "step" => step.step_name.clone())
            .record(duration as f64);
    }
}

pub fn record_chunk_items(step_name: &str, metrics: &ChunkMetrics) {
    counter!("batch_chunk_items_read_total", "step" => step_name.to_string())
        .increment(metrics.read_count.max(0) as u64);
    counter!("batch_chunk_items_written_total", "step" => step_name.to_string())
        .increment(metrics.write_count.max(0) as u64);
}

pub fn record_step_retry(label: &str) {
    counter!("batch_step_retries_total", "step" => label.to_string()).increment(1);
}
