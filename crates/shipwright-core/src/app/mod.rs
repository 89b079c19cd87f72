//! App - アプリケーション層
//!
//! ports を組み合わせて 1 round の処理を実装します。
//!
//! # 主要コンポーネント
//! - **ContentGenerator**: brief から index.html を作る
//! - **Publisher**: repository の用意とファイルの反映
//! - **HostingPublisher**: Pages の有効化と URL の取得
//! - **Notifier**: 評価サービスへの通知（retry 付き）
//! - **Pipeline**: 上記を順に流し、stage を報告する
//! - **GcLoop**: 終了した round を retention 経過後に削除
//! - **AppBuilder**: 設定からのワイヤリング

pub mod builder;
pub mod gc_loop;
pub mod generator;
pub mod hosting;
pub mod notifier;
pub mod pipeline;
pub mod publisher;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder};
pub use self::gc_loop::GcLoop;
pub use self::generator::ContentGenerator;
pub use self::hosting::HostingPublisher;
pub use self::notifier::Notifier;
pub use self::pipeline::Pipeline;
pub use self::publisher::Publisher;
