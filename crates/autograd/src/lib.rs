//! 自動微分エンジン
//!
//! 計算結果に勾配関数（計算グラフのエッジ）を記録し、出力側から逆順に
//! 勾配を伝播するリバースモード自動微分を提供します。
//!
//! ## モジュール構成
//!
//! - `differentiable`: 微分可能な変数 `Differentiable<T>`
//! - `registry`: 演算キーから順伝播・勾配関数への対応表
//! - `traits`: 勾配の累積・初期勾配・勾配関数のトレイト

mod differentiable;
mod error;
mod ndarray_impl;
pub mod registry;
pub mod traits;

pub use differentiable::Differentiable;
pub use error::AutogradError;
pub use registry::{
    DuplicatePolicy, ForwardFn, GradientFn, OpDef, OpKey, OpRegistry, OpSchema, RecordedOp,
    RegistryConfig,
};
pub use traits::{GradFn, GradNode, GradRoot};
