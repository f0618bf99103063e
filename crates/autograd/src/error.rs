//! 自動微分エンジンのエラー型

use std::error::Error;

/// 演算の登録・適用・逆伝播で発生するエラー
#[derive(thiserror::Error, Debug)]
pub enum AutogradError {
    /// 同じキーの演算が既に登録されている（`DuplicatePolicy::Reject` の場合）
    #[error("operator `{op}` is already registered")]
    DuplicateRegistration { op: &'static str },

    /// 未登録の演算を適用しようとした
    #[error("operator `{op}` is not registered")]
    UnknownOp { op: &'static str },

    /// 入力数または勾配数が演算の定義と一致しない
    #[error("operator `{op}` expects {expected} operand(s), got {found}")]
    ArityMismatch {
        op: &'static str,
        expected: usize,
        found: usize,
    },

    /// 形状や型の異なる勾配を累積しようとした
    #[error("cannot accumulate a gradient of {found} into {expected}")]
    IncompatibleGradient { expected: String, found: String },

    /// 登録されたカーネルが失敗した
    #[error("kernel for `{op}` failed: {source}")]
    Kernel {
        op: &'static str,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl AutogradError {
    /// カーネル側のエラーを演算名付きで包む
    pub fn kernel<E>(op: &'static str, source: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        AutogradError::Kernel {
            op,
            source: Box::new(source),
        }
    }
}
