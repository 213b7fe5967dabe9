//! Wiki 导出：列出全部页面，逐个加载并写入本地目录（保留子目录结构）

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::backend::Backend;

/// 导出全部 wiki 页面到 base_path，返回写入的文件路径
pub async fn dump_wiki(backend: &dyn Backend, base_path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let listing = backend.list_wiki().await.context("list wiki")?;
    let mut written = Vec::with_capacity(listing.paths.len());

    for path in &listing.paths {
        let page = backend
            .load_wiki(path)
            .await
            .with_context(|| format!("load wiki {}", path))?;
        let name = if page.file.is_empty() { path } else { &page.file };
        let target = base_path.join(name.trim_start_matches('/'));
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        std::fs::write(&target, &page.content)
            .with_context(|| format!("write {}", target.display()))?;
        tracing::info!(file = %target.display(), "wiki page saved");
        written.push(target);
    }

    Ok(written)
}
