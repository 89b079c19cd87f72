//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::ids::{AttemptId, SubmissionId};
use crate::ports::Clock;

/// IdGenerator は submission / attempt の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数 worker から使える）
pub trait IdGenerator: Send + Sync {
    fn generate_submission_id(&self) -> SubmissionId;

    fn generate_attempt_id(&self) -> AttemptId;
}

/// UlidGenerator は Clock の現在時刻から ULID を作る
///
/// FixedClock を渡すと timestamp 部分が固定され、テストで扱いやすくなります。
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_submission_id(&self) -> SubmissionId {
        SubmissionId::from(self.next_ulid())
    }

    fn generate_attempt_id(&self) -> AttemptId {
        AttemptId::from(self.next_ulid())
    }
}
