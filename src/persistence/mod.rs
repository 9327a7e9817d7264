//! 持久化模块
//!
//! 跨运行保存的唯一状态是去重账本：会话状态本身从不落盘，
//! 只有它对账本的影响会被保存。
//!
//! ## 文件结构
//!
//! ```text
//! downloaded_server_ids.json      # 已下载服务器 ID（JSON 数组）
//! downloaded_server_ids.json.tmp  # 保存过程中的临时文件，重命名后消失
//! ```

pub mod ledger;

pub use ledger::DedupLedger;
