//! 导出任务后端的 wiki 到本地目录
//!
//! 用法：sgr-dump-wiki <task_id> [target_dir] [--projects]
//! `--projects` 额外把全部项目（分页拉取）写成 projects.json。

use std::path::PathBuf;

use anyhow::Context;
use sgr_agent::backend::session::TaskInfo;
use sgr_agent::backend::{dump_wiki, list_all_projects, BenchmarkClient};
use sgr_agent::config::load_config;
use sgr_agent::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let with_projects = match args.iter().position(|a| a == "--projects") {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    };
    let task_id = args
        .first()
        .cloned()
        .context("usage: sgr-dump-wiki <task_id> [target_dir] [--projects]")?;
    let target = PathBuf::from(args.get(1).map(String::as_str).unwrap_or("wiki"));

    let cfg = load_config(None).context("Failed to load config")?;
    let bench = &cfg.benchmark;
    let core = BenchmarkClient::new(&bench.base_url, bench.api_key(), bench.request_timeout_secs)
        .context("Failed to build benchmark client")?;
    let task = TaskInfo {
        task_id,
        spec_id: String::new(),
        task_text: String::new(),
    };
    let backend = core.task_backend(&bench.benchmark, &task);

    let written = dump_wiki(&backend, &target).await?;
    println!("{} wiki pages written to {}", written.len(), target.display());

    if with_projects {
        let projects = list_all_projects(&backend, 10)
            .await
            .context("Failed to list projects")?;
        let path = target.join("projects.json");
        std::fs::write(&path, serde_json::to_string_pretty(&projects)?)
            .with_context(|| format!("write {}", path.display()))?;
        println!("{} projects written to {}", projects.len(), path.display());
    }

    Ok(())
}
