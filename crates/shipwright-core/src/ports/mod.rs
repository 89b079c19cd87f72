//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 外部サービス（LLM, GitHub, 評価 callback）と時刻・ID をここで trait にし、
//! 実装の詳細は `impls` に置きます。

pub mod artifact_store;
pub mod callback;
pub mod clock;
pub mod event_sink;
pub mod generator;
pub mod hosting;
pub mod id_generator;

// 主要な trait を再エクスポート
pub use self::artifact_store::{ArtifactStore, FileWrite, StoreError};
pub use self::callback::{CallbackClient, CallbackError};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::{EventSink, NoopEventSink};
pub use self::generator::{GenerationError, GenerationRequest, GenerationService};
pub use self::hosting::{HostingApi, HostingError};
pub use self::id_generator::{IdGenerator, UlidGenerator};
