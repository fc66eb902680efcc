use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use batch_core::{init_logging, AppConfig, BatchStatus, ExecutionRepository};
use batch_engine::{JobLauncher, JobOperator};
use batch_infrastructure::{DatabaseManager, InMemoryExecutionRepository};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

mod jobs;

/// 批处理作业执行引擎命令行
#[derive(Parser, Debug)]
#[command(name = "batch")]
#[command(version = "1.0.0")]
#[command(about = "批处理作业执行引擎 - 启动作业并查询执行历史")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 日志格式 (json, text, pretty)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// 覆盖配置中的数据库URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// 使用内存仓储，进程退出后历史丢失
    #[arg(long, global = true, conflicts_with = "database_url")]
    in_memory: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 启动作业并等待结束
    Launch {
        /// 作业名称
        job: String,
        /// 作业参数 key=value，可重复
        #[arg(short = 'p', long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
        /// 重新执行所有步骤，忽略先前的成功记录
        #[arg(short, long)]
        force: bool,
    },
    /// 列出所有作业执行
    Executions,
    /// 查看作业执行详情（含步骤）
    Execution {
        /// 作业执行ID
        id: i64,
    },
    /// 查看作业执行的步骤
    Steps {
        /// 作业执行ID
        id: i64,
    },
    /// 查看作业实例的参数
    Params {
        /// 作业实例ID
        instance_id: i64,
    },
    /// 列出已注册的作业
    Jobs,
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("参数格式应为 key=value: {raw}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("序列化输出失败")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())
        .with_context(|| format!("加载配置失败: {:?}", cli.config))?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.parse()?;
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.parse()?;
    }
    if let Some(url) = &cli.database_url {
        config.database.url = url.clone();
    }

    init_logging(&config.logging)?;

    let registry = Arc::new(jobs::demo_registry(&config.engine).context("构建作业目录失败")?);

    let (repository, manager): (Arc<dyn ExecutionRepository>, Option<DatabaseManager>) =
        if cli.in_memory {
            info!("使用内存执行仓储");
            (Arc::new(InMemoryExecutionRepository::new()), None)
        } else {
            let manager = DatabaseManager::new(&config.database)
                .await
                .with_context(|| format!("连接数据库失败: {}", config.database.url))?;
            (manager.execution_repository(), Some(manager))
        };

    let launcher = JobLauncher::with_config(registry.clone(), repository.clone(), config.engine.clone());
    let operator = JobOperator::new(registry, repository);

    let exit_code = match cli.command {
        Commands::Launch { job, params, force } => {
            let execution = launcher
                .launch(&job, params, force)
                .await
                .with_context(|| format!("启动作业失败: {job}"))?;
            print_json(&execution)?;
            match execution.status {
                BatchStatus::Completed => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            }
        }
        Commands::Executions => {
            print_json(&operator.list_executions().await?)?;
            ExitCode::SUCCESS
        }
        Commands::Execution { id } => {
            print_json(&operator.get_execution(id).await?)?;
            ExitCode::SUCCESS
        }
        Commands::Steps { id } => {
            print_json(&operator.get_steps(id).await?)?;
            ExitCode::SUCCESS
        }
        Commands::Params { instance_id } => {
            print_json(&operator.get_parameters(instance_id).await?)?;
            ExitCode::SUCCESS
        }
        Commands::Jobs => {
            print_json(&operator.job_names())?;
            ExitCode::SUCCESS
        }
    };

    if let Some(manager) = manager {
        manager.close().await;
    }

    Ok(exit_code)
}
