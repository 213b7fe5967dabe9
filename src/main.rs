//! SGR Agent - 基准会话驱动
//!
//! 入口：初始化日志与配置，开启会话，逐个任务运行 Agent 并打印评分。

use std::sync::Arc;

use anyhow::Context;
use sgr_agent::backend::session::StartSession;
use sgr_agent::backend::{BenchmarkClient, BenchmarkTelemetry};
use sgr_agent::config::load_config;
use sgr_agent::llm::OpenAiClient;
use sgr_agent::observability;
use sgr_agent::{AgentSettings, SgrAgent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(Into::into);
    let cfg = load_config(config_path).context("Failed to load config")?;

    let llm_key = cfg
        .llm
        .api_key()
        .with_context(|| format!("{} is not set", cfg.llm.api_key_env))?;
    let llm = Arc::new(OpenAiClient::new(
        cfg.llm.base_url.as_deref(),
        &cfg.llm.model,
        &llm_key,
        cfg.llm.request_timeout_secs,
    ));

    let bench = &cfg.benchmark;
    let core = BenchmarkClient::new(&bench.base_url, bench.api_key(), bench.request_timeout_secs)
        .context("Failed to build benchmark client")?;

    let session = core
        .start_session(&StartSession {
            benchmark: &bench.benchmark,
            workspace: &bench.workspace,
            name: &format!("{} ({})", bench.session_name, cfg.llm.model),
            architecture: &bench.architecture,
        })
        .await
        .context("Failed to start session")?;
    let status = core
        .session_status(&session.session_id)
        .await
        .context("Failed to fetch session status")?;
    println!("Session has {} tasks", status.tasks.len());

    let settings = AgentSettings::from_config(&cfg);
    let telemetry = Arc::new(BenchmarkTelemetry::new(core.clone()));

    for task in &status.tasks {
        if !bench.spec_filter.is_empty() && !bench.spec_filter.contains(&task.spec_id) {
            continue;
        }

        println!("{}", "=".repeat(40));
        println!(
            "Starting Task: {} ({}): {}",
            task.task_id, task.spec_id, task.task_text
        );
        core.start_task(task)
            .await
            .with_context(|| format!("Failed to start task {}", task.task_id))?;

        let backend = Arc::new(core.task_backend(&bench.benchmark, task));
        let agent = SgrAgent::new(llm.clone(), backend, settings.clone())
            .with_telemetry(telemetry.clone());
        match agent.run(task).await {
            Ok(run) => tracing::info!(
                task_id = %task.task_id,
                steps = run.steps,
                stop = ?run.stop,
                "agent finished"
            ),
            Err(e) => println!("{}", e),
        }

        telemetry.flush().await;
        let result = core
            .complete_task(task)
            .await
            .with_context(|| format!("Failed to complete task {}", task.task_id))?;
        if let Some(eval) = result.eval {
            let explain: String = eval.logs.lines().map(|l| format!("  {}\n", l)).collect();
            println!("\nSCORE: {}\n{}", eval.score, explain);
        }
    }

    if bench.submit {
        core.submit_session(&session.session_id)
            .await
            .context("Failed to submit session")?;
        println!("Session {} submitted", session.session_id);
    }

    let (prompt, completion, total) = llm.usage.get();
    tracing::info!(prompt, completion, total, "token usage");
    Ok(())
}
