//! 演算レジストリ
//!
//! 演算キーから「順伝播関数と勾配関数の組」への対応表を提供します。
//! レジストリは初期化時に一度だけ構築し、以降は読み取り専用で参照します。
//!
//! # 使用例
//!
//! ```ignore
//! let mut registry = OpRegistry::new();
//! registry.register(MyOp::Square, square_def())?;
//!
//! let x = Differentiable::new(3.0_f64);
//! let y = registry.apply(MyOp::Square, &[&x])?;
//! y.backward()?;
//! ```

use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use typed_builder::TypedBuilder;

use crate::differentiable::Differentiable;
use crate::error::AutogradError;
use crate::traits::{GradFn, GradNode};

// ============================================================================
// 演算キーと定義
// ============================================================================

/// 演算を識別するキー
///
/// 文字列ではなく型付きのキー（通常は enum）で演算を引くためのトレイト。
pub trait OpKey: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// 演算名（ログとエラーメッセージに使用）
    fn name(&self) -> &'static str;
}

/// 順伝播関数: 入力値から出力値を計算する
pub type ForwardFn<T> = fn(&[&T]) -> Result<T, AutogradError>;

/// 勾配関数: 記録された演算と出力の勾配から、各入力の勾配を計算する
///
/// 戻り値の長さは演算の入力数と一致しなければならない。
pub type GradientFn<K, T> = fn(&RecordedOp<K, T>, &T) -> Result<Vec<T>, AutogradError>;

/// 演算のメタデータ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpSchema {
    /// 勾配演算の名前（カーネルシンボル名にも使用）
    pub gradient_name: &'static str,
    /// 入力の数
    pub num_inputs: usize,
    /// 演算の説明
    pub doc: &'static str,
}

/// 登録される演算の定義
pub struct OpDef<K, T> {
    pub schema: OpSchema,
    pub forward: ForwardFn<T>,
    pub gradient: GradientFn<K, T>,
}

// fn ポインタは常に Copy なので、K / T に境界を要求しない手動実装
impl<K, T> Clone for OpDef<K, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, T> Copy for OpDef<K, T> {}

impl<K, T> Debug for OpDef<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpDef")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// 逆伝播のために記録された演算
///
/// 勾配関数はここから順伝播時の入力値を取り出す。
#[derive(Debug, Clone)]
pub struct RecordedOp<K, T> {
    key: K,
    inputs: Vec<T>,
}

impl<K: OpKey, T> RecordedOp<K, T> {
    /// index 番目の入力を取得
    pub fn input(&self, index: usize) -> Result<&T, AutogradError> {
        self.inputs
            .get(index)
            .ok_or(AutogradError::ArityMismatch {
                op: self.key.name(),
                expected: index + 1,
                found: self.inputs.len(),
            })
    }
}

// ============================================================================
// RegisteredBackward (登録された勾配関数の逆伝播)
// ============================================================================

/// レジストリ経由で適用された演算の勾配関数
///
/// 勾配関数のポインタは演算の記録時に解決して保持する。逆伝播時に
/// レジストリを引き直さないので、1つの記録につき勾配関数は1回だけ呼ばれる。
struct RegisteredBackward<K, T: 'static> {
    op: RecordedOp<K, T>,
    inputs: Vec<Differentiable<T>>,
    gradient: GradientFn<K, T>,
}

impl<K, T> GradFn<T> for RegisteredBackward<K, T>
where
    K: OpKey,
    T: GradNode,
{
    fn name(&self) -> &'static str {
        self.op.key.name()
    }

    fn inputs(&self) -> &[Differentiable<T>] {
        &self.inputs
    }

    fn backward(&self, grad_y: &T) -> Result<Vec<T>, AutogradError> {
        (self.gradient)(&self.op, grad_y)
    }
}

// ============================================================================
// OpRegistry
// ============================================================================

/// 同じキーを二度登録したときの振る舞い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// エラーを返し、既存の定義を残す
    #[default]
    Reject,
    /// 新しい定義で上書きする
    Replace,
    /// 何もしない（既存の定義を残す）
    Ignore,
}

/// レジストリの設定
///
/// # Example
///
/// ```ignore
/// let config = RegistryConfig::builder()
///     .duplicate_policy(DuplicatePolicy::Replace)
///     .build();
/// let registry = OpRegistry::<MyOp, f64>::with_config(config);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct RegistryConfig {
    /// 重複登録の扱い（デフォルト: Reject）
    #[builder(default)]
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// 演算キーから定義への対応表
pub struct OpRegistry<K, T> {
    config: RegistryConfig,
    ops: FxHashMap<K, OpDef<K, T>>,
}

impl<K: OpKey, T: GradNode> Default for OpRegistry<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: OpKey, T: GradNode> OpRegistry<K, T> {
    /// デフォルト設定で空のレジストリを作成
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            ops: FxHashMap::default(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// 演算を登録
    ///
    /// 既に同じキーが登録されている場合は `DuplicatePolicy` に従う。
    /// どの場合もキーあたりの定義は1つだけになる。
    pub fn register(&mut self, key: K, def: OpDef<K, T>) -> Result<(), AutogradError> {
        if !self.ops.contains_key(&key) {
            log::debug!(
                "registered op `{}` (gradient `{}`, {} input(s))",
                key.name(),
                def.schema.gradient_name,
                def.schema.num_inputs
            );
            self.ops.insert(key, def);
            return Ok(());
        }

        match self.config.duplicate_policy {
            DuplicatePolicy::Reject => Err(AutogradError::DuplicateRegistration { op: key.name() }),
            DuplicatePolicy::Replace => {
                log::warn!("op `{}` registered twice; replacing definition", key.name());
                self.ops.insert(key, def);
                Ok(())
            }
            DuplicatePolicy::Ignore => {
                log::warn!("op `{}` registered twice; keeping first definition", key.name());
                Ok(())
            }
        }
    }

    pub fn get(&self, key: K) -> Option<&OpDef<K, T>> {
        self.ops.get(&key)
    }

    pub fn contains(&self, key: K) -> bool {
        self.ops.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// 登録済みの演算を適用
    ///
    /// いずれかの入力が requires_grad = true なら、勾配関数を記録した
    /// 出力を返す。そうでなければ逆伝播経路を持たない出力を返す。
    pub fn apply(
        &self,
        key: K,
        inputs: &[&Differentiable<T>],
    ) -> Result<Differentiable<T>, AutogradError> {
        let def = self
            .ops
            .get(&key)
            .ok_or(AutogradError::UnknownOp { op: key.name() })?;
        if inputs.len() != def.schema.num_inputs {
            return Err(AutogradError::ArityMismatch {
                op: key.name(),
                expected: def.schema.num_inputs,
                found: inputs.len(),
            });
        }

        let values: Vec<T> = inputs.iter().map(|x| x.value()).collect();
        let refs: Vec<&T> = values.iter().collect();
        let output = (def.forward)(&refs)?;
        log::trace!("applied `{}` to {} input(s)", key.name(), inputs.len());

        if !inputs.iter().any(|x| x.requires_grad()) {
            return Ok(Differentiable::new_no_grad(output));
        }

        let backward = RegisteredBackward {
            op: RecordedOp {
                key,
                inputs: values,
            },
            inputs: inputs.iter().map(|&x| x.clone()).collect(),
            gradient: def.gradient,
        };
        Ok(Differentiable::with_grad_fn(output, Arc::new(backward)))
    }
}
