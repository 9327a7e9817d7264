//! 已下载记录（去重账本）
//!
//! 记录已成功下载的服务器 ID，使整个流程可以中断后续跑且不会重复下载。
//!
//! ## 文件格式
//!
//! JSON 字符串数组（按字典序排列）：
//! ```json
//! ["CH#1", "US-FREE#3", "US-NY#12"]
//! ```
//!
//! 文件不存在时视为空集合；文件损坏时同样视为空集合并输出警告，
//! 宁可重复下载也不中断运行。

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

/// 去重账本
#[derive(Debug, Clone)]
pub struct DedupLedger {
    /// 记录文件路径
    path: PathBuf,
    /// 已下载的 ID 集合
    ids: HashSet<String>,
}

impl DedupLedger {
    /// 创建一个空账本（不读取文件）
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ids: HashSet::new(),
        }
    }

    /// 加载账本
    ///
    /// - 文件不存在：返回空账本
    /// - 文件损坏或无法读取：输出警告并返回空账本
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        if !path.exists() {
            debug!("记录文件不存在，从空集合开始: {:?}", path);
            return Self::empty(path);
        }

        match read_ids(&path) {
            Ok(ids) => {
                info!("已加载 {} 个已下载的服务器 ID: {:?}", ids.len(), path);
                Self { path, ids }
            }
            Err(e) => {
                warn!("记录文件损坏，忽略并从空集合开始: {:?}, 错误: {}", path, e);
                Self::empty(path)
            }
        }
    }

    /// 将完整集合写回文件
    ///
    /// 先写入临时文件，再原子重命名
    pub fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = temp_path_for(&self.path);

        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer_pretty(&mut writer, &self.sorted_ids()).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to serialize ledger: {}", e),
            )
        })?;

        writer.flush()?;
        drop(writer);

        fs::rename(&temp_path, &self.path)?;

        debug!("已保存 {} 个服务器 ID: {:?}", self.ids.len(), self.path);
        Ok(())
    }

    /// 是否已下载
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// 记录一个新下载的 ID，返回是否为新增
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 按字典序排列的 ID 列表（持久化顺序）
    pub fn sorted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.iter().collect();
        ids.sort_unstable();
        ids
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "ledger.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn read_ids(path: &Path) -> io::Result<HashSet<String>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let ids: Vec<String> = serde_json::from_reader(reader).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse ledger: {}", e),
        )
    })?;

    Ok(ids.into_iter().collect())
}
