use crate::differentiable::Differentiable;
use crate::error::AutogradError;

/// 逆伝播の中間点として使用可能な型
///
/// 同じ変数に複数の経路から勾配が届くため、勾配同士を合算できる必要がある。
pub trait GradNode: Clone + Send + Sync + 'static {
    /// 既存の勾配に新しい勾配を加算した値を返す
    ///
    /// 形状や型が一致しない場合は `AutogradError::IncompatibleGradient` を返す。
    fn accumulate(&self, other: &Self) -> Result<Self, AutogradError>;
}

/// 逆伝播の起点として使用可能な型
/// 初期勾配を生成するメソッドを持つ
pub trait GradRoot: GradNode {
    /// 自身と同じ形状の初期勾配を生成（全要素が 1）
    fn unit_grad_like(&self) -> Self;
}

/// 勾配関数を表すトレイト (計算グラフのエッジ)
///
/// 出力の勾配から各入力の勾配を計算する。勾配を入力へ流し込むのは
/// エンジン側の役割で、勾配関数自身は値を返すだけにする。
pub trait GradFn<T: 'static>: Send + Sync {
    /// 演算名（エラーメッセージに使用）
    fn name(&self) -> &'static str;

    /// このエッジの入力変数
    fn inputs(&self) -> &[Differentiable<T>];

    /// 出力側の勾配から入力ごとの勾配を計算する
    ///
    /// 戻り値の長さは `inputs()` と一致しなければならない。
    fn backward(&self, grad_y: &T) -> Result<Vec<T>, AutogradError>;
}

// ============================================================================
// f32 / f64 へのトレイト実装
// ============================================================================

macro_rules! impl_grad_root_for_float {
    ($t:ty) => {
        impl GradNode for $t {
            fn accumulate(&self, other: &Self) -> Result<Self, AutogradError> {
                Ok(self + other)
            }
        }

        impl GradRoot for $t {
            fn unit_grad_like(&self) -> Self {
                1.0
            }
        }
    };
}

impl_grad_root_for_float!(f32);
impl_grad_root_for_float!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_accumulate() {
        assert_eq!(1.5_f64.accumulate(&2.0).unwrap(), 3.5);
        assert_eq!(1.5_f32.accumulate(&-0.5).unwrap(), 1.0);
    }

    #[test]
    fn test_scalar_unit_grad() {
        assert_eq!(42.0_f64.unit_grad_like(), 1.0);
        assert_eq!(f32::NAN.unit_grad_like(), 1.0);
    }
}
