//! Errors - 失敗の運用分類
//!
//! 各コンポーネントのエラー型は `kind()` でここに分類され、
//! queue 側の Decider が retry / dead を決めます。

use serde::{Deserialize, Serialize};

/// ErrorKind は実行エラーの分類
///
/// - Transient: 一時的なエラー（リトライ推奨）。生成サービスや GitHub の通信失敗、5xx
/// - Permanent: 恒久的なエラー（リトライ無意味）。round > 1 なのに repository が無い、4xx
/// - Infrastructure: ローカル環境のエラー（working directory の I/O 失敗）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

impl ErrorKind {
    /// Does retrying the whole round have a chance of succeeding?
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::Permanent)
    }

    /// HTTP status から分類する（5xx / 408 / 409 / 429 は一時的とみなす）
    pub fn from_status(status: u16) -> Self {
        match status {
            408 | 409 | 429 => ErrorKind::Transient,
            s if s >= 500 => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        }
    }
}
