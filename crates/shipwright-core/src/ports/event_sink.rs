//! EventSink port - round の進行状況を記録
//!
//! pipeline は stage が変わるたびにここへ通知します。
//! queue の lease が実装し、status 照会で「どこで止まっているか」が見えます。

use async_trait::async_trait;

use crate::domain::Stage;

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn stage_entered(&self, stage: Stage);
}

/// 何もしない EventSink（単体実行やテスト用）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn stage_entered(&self, _stage: Stage) {}
}
