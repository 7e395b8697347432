use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use log::{debug, error, info, warn};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::fs;
use tokio::sync::mpsc;

use super::client::LanguageModel;
use super::prompt::{SYSTEM_PROMPT, build_prompt, extract_seed};
use super::request::{SeedRequest, load_examples};
use crate::config::FuzzerDir;
use crate::error::SeedGenError;

/// 同一时间只处理一个请求，处理期间到达的请求会被丢弃
pub struct SeedGenerator<M> {
    dir: FuzzerDir,
    program: String,
    model: M,
    delay: Duration,
    count: AtomicUsize,
    generating: AtomicBool,
}

impl<M: LanguageModel + 'static> SeedGenerator<M> {
    pub fn new(dir: FuzzerDir, program: impl Into<String>, model: M, delay: Duration) -> Self {
        Self {
            dir,
            program: program.into(),
            model,
            delay,
            count: AtomicUsize::new(0),
            generating: AtomicBool::new(false),
        }
    }

    /// 已经生成的种子数量
    pub fn generated(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// 处理一个请求文件，返回新种子在队列中的路径
    pub async fn generate(&self, request: &Path) -> Result<PathBuf, SeedGenError> {
        // 等待模糊测试器写完请求文件
        tokio::time::sleep(self.delay).await;

        let request = SeedRequest::parse(&fs::read_to_string(request).await?);
        let good = load_examples(&request.good).await;
        let bad = load_examples(&request.bad).await;
        info!("读取到 {} 个有效样例，{} 个无效样例", good.len(), bad.len());

        let prompt = build_prompt(&self.program, &good, &bad);
        debug!("提示词: {prompt}");
        let reply = self.model.complete(SYSTEM_PROMPT, &prompt).await?;
        debug!("模型回复: {reply}");

        self.publish(&extract_seed(&reply)).await
    }

    async fn publish(&self, seed: &str) -> Result<PathBuf, SeedGenError> {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        let tmp = self.dir.tmp_input(n);
        let queued = self.dir.queued_input(n);
        fs::write(&tmp, seed).await?;
        fs::hard_link(&tmp, &queued).await?;
        info!("新种子已写入 {}", queued.display());
        Ok(queued)
    }

    /// 开始处理请求，如果已有请求在处理中则返回 false
    fn try_spawn(self: &Arc<Self>, request: PathBuf) -> bool {
        if self.generating.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return false;
        }
        let this = self.clone();
        tokio::spawn(async move {
            let _guard = ClearOnDrop(&this.generating);
            if let Err(e) = this.generate(&request).await {
                error!("处理请求 {} 失败: {e}", request.display());
            }
        });
        true
    }

    fn handle_event(self: &Arc<Self>, event: Event) {
        if !matches!(event.kind, EventKind::Create(_)) {
            return;
        }
        for path in event.paths {
            if !self.dir.is_request(&path) {
                continue;
            }
            info!("收到请求 {}", path.display());
            if !self.try_spawn(path) {
                debug!("已有请求在处理中，忽略本次请求");
            }
        }
    }

    /// 监听请求目录直到收到 Ctrl-C 或 SIGTERM
    pub async fn watch(self: Arc<Self>) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&self.dir.root(), RecursiveMode::NonRecursive)?;
        info!("开始监听 {}", self.dir.root().display());

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                res = rx.recv() => match res {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(e)) => warn!("监听出错: {e}"),
                    None => break,
                },
            }
        }

        info!("停止监听，共生成 {} 个种子", self.generated());
        Ok(())
    }
}

/// 离开作用域时清除标记，任务 panic 时同样会清除
struct ClearOnDrop<'a>(&'a AtomicBool);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("无法监听 SIGTERM: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
