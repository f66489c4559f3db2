//! # 秘匿化結果ストア
//!
//! 秘匿化済みテキストをプロセス内メモリに保持する。Enclave外には書き出さない。
//! 保持件数には上限があり、超えた場合は最も古い結果から破棄する。

use std::collections::{HashMap, VecDeque};

use tokio::sync::RwLock;

/// 保持件数の既定上限
pub const DEFAULT_MAX_STORED_FILES: usize = 1024;

/// 保存済みの秘匿化結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// ダウンロード時のファイル名
    pub file_name: String,
    pub content: String,
}

#[derive(Default)]
struct Inner {
    files: HashMap<String, StoredFile>,
    /// 保存順のfile_id（先頭が最古）
    order: VecDeque<String>,
}

/// file_id → 秘匿化結果のメモリ内ストア。
pub struct FileStore {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_STORED_FILES)
    }
}

impl FileStore {
    /// 保持件数の上限を指定して作る。0は1として扱う。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    /// 保存する。同じfile_idがあれば上書きする。
    ///
    /// 上限を超えた場合は最も古い結果を破棄し、そのfile_idを返す。
    pub async fn store(&self, file_id: &str, file: StoredFile) -> Option<String> {
        let mut inner = self.inner.write().await;
        if inner.files.insert(file_id.to_string(), file).is_some() {
            inner.order.retain(|id| id != file_id);
        }
        inner.order.push_back(file_id.to_string());

        if inner.files.len() > self.capacity {
            let evicted = inner.order.pop_front()?;
            inner.files.remove(&evicted);
            return Some(evicted);
        }
        None
    }

    pub async fn get(&self, file_id: &str) -> Option<StoredFile> {
        self.inner.read().await.files.get(file_id).cloned()
    }

    /// 削除する。存在した場合は `true`。
    pub async fn remove(&self, file_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let removed = inner.files.remove(file_id).is_some();
        if removed {
            inner.order.retain(|id| id != file_id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.files.len()
    }
}
