// Standard library imports
use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

// Third party imports
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct TrackedTask {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TrackedTask {
    fn is_live(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| !h.is_finished())
    }
}

/// Tập task nền được giám sát, định danh bằng tên.
///
/// Hai task cùng tên không bao giờ chạy song song: `spawn_and_track` bỏ qua
/// yêu cầu mới nếu task cũ vẫn còn chạy. Task tự xóa khỏi tập khi kết thúc.
#[derive(Clone, Default)]
pub struct TaskManager {
    tasks: Arc<DashMap<String, TrackedTask>>,
    generation: Arc<AtomicU64>,
}

impl TaskManager {
    /// Tạo task manager rỗng
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn task nếu chưa có task cùng tên đang chạy. Trả về `false` khi bị bỏ qua.
    pub fn spawn_and_track<F>(&self, name: &str, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        match self.tasks.entry(name.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live() {
                    debug!("Task '{}' đang chạy, bỏ qua", name);
                    return false;
                }
                let handle = self.spawn_inner(name, generation, future);
                occupied.insert(TrackedTask { generation, handle: Some(handle) });
            }
            Entry::Vacant(vacant) => {
                let handle = self.spawn_inner(name, generation, future);
                vacant.insert(TrackedTask { generation, handle: Some(handle) });
            }
        }
        true
    }

    fn spawn_inner<F>(&self, name: &str, generation: u64, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tasks = Arc::clone(&self.tasks);
        let key = name.to_string();
        tokio::spawn(async move {
            future.await;
            tasks.remove_if(&key, |_, task| task.generation == generation);
        })
    }

    /// Task với tên này có đang chạy không
    pub fn is_running(&self, name: &str) -> bool {
        self.tasks.get(name).map_or(false, |task| task.is_live())
    }

    /// Có task nào đang chạy với tên bắt đầu bằng `prefix` không
    pub fn has_task_with_prefix(&self, prefix: &str) -> bool {
        self.tasks
            .iter()
            .any(|entry| entry.key().starts_with(prefix) && entry.value().is_live())
    }

    /// Số task đang chạy
    pub fn running_count(&self) -> usize {
        self.tasks.iter().filter(|entry| entry.value().is_live()).count()
    }

    /// Chờ tất cả task hiện có kết thúc
    pub async fn join_all(&self) {
        let handles: Vec<(String, JoinHandle<()>)> = self
            .tasks
            .iter_mut()
            .filter_map(|mut entry| {
                let name = entry.key().clone();
                entry.value_mut().handle.take().map(|h| (name, h))
            })
            .collect();

        for (name, handle) in handles {
            if let Err(e) = handle.await {
                warn!("Task '{}' kết thúc bất thường: {}", name, e);
            }
            self.tasks.remove_if(&name, |_, task| task.handle.is_none());
        }
    }

    /// Hủy tất cả task
    pub fn abort_all(&self) {
        for entry in self.tasks.iter() {
            if let Some(handle) = &entry.value().handle {
                handle.abort();
            }
        }
        self.tasks.clear();
    }
}
