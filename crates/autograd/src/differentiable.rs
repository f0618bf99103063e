use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, Mutex};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::AutogradError;
use crate::traits::{GradFn, GradNode, GradRoot};

// ============================================================================
// Differentiable (微分可能な変数)
// ============================================================================

/// 変数の内部データ
struct DifferentiableInner<T: 'static> {
    value: T,
    grad: Option<Differentiable<T>>,
    grad_fn: Option<Arc<dyn GradFn<T>>>,
    requires_grad: bool,
}

/// 変数（リーフまたは計算結果）
///
/// `Arc<Mutex<...>>` のハンドルなので、クローンは同じノードを指す。
pub struct Differentiable<T: 'static>(Arc<Mutex<DifferentiableInner<T>>>);

impl<T: 'static> Clone for Differentiable<T> {
    fn clone(&self) -> Self {
        Differentiable(Arc::clone(&self.0))
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Differentiable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 逆伝播中など、ロック中のノードを表示してもデッドロックしないように try_lock
        match self.0.try_lock() {
            Ok(inner) => f
                .debug_struct("Differentiable")
                .field("value", &inner.value)
                .field("requires_grad", &inner.requires_grad)
                .field("has_grad_fn", &inner.grad_fn.is_some())
                .finish(),
            Err(_) => f.write_str("Differentiable { <locked> }"),
        }
    }
}

impl<T: 'static> Differentiable<T> {
    fn from_parts(
        value: T,
        grad_fn: Option<Arc<dyn GradFn<T>>>,
        requires_grad: bool,
    ) -> Differentiable<T> {
        Differentiable(Arc::new(Mutex::new(DifferentiableInner {
            value,
            grad: None,
            grad_fn,
            requires_grad,
        })))
    }

    /// 新しいリーフ変数を作成（requires_grad = true）
    pub fn new(value: T) -> Differentiable<T> {
        Self::from_parts(value, None, true)
    }

    /// 新しいリーフ変数を作成（requires_grad = false）
    pub fn new_no_grad(value: T) -> Differentiable<T> {
        Self::from_parts(value, None, false)
    }

    /// 勾配関数付きの変数を作成（演算結果用、requires_grad = true）
    pub fn with_grad_fn(value: T, grad_fn: Arc<dyn GradFn<T>>) -> Differentiable<T> {
        Self::from_parts(value, Some(grad_fn), true)
    }

    /// requires_grad の値を取得
    pub fn requires_grad(&self) -> bool {
        self.0.lock().unwrap().requires_grad
    }

    /// 逆伝播の経路（grad_fn）を持っているか
    pub fn has_grad_fn(&self) -> bool {
        self.0.lock().unwrap().grad_fn.is_some()
    }

    /// 値への参照を取得してクロージャを実行
    pub fn with_value<R, F: FnOnce(&T) -> R>(&self, f: F) -> R {
        let inner = self.0.lock().unwrap();
        f(&inner.value)
    }

    /// ノードの同一性（クローン間で共通）
    fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    fn grad_fn(&self) -> Option<Arc<dyn GradFn<T>>> {
        self.0.lock().unwrap().grad_fn.clone()
    }

    /// 自身から到達できるノードを出力側から順に並べる（トポロジカル順）
    fn topo_order(&self) -> Vec<Differentiable<T>> {
        let mut order = Vec::new();
        let mut visited = FxHashSet::default();
        // (ノード, 子を展開済みか)
        let mut stack = vec![(self.clone(), false)];

        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                order.push(node);
                continue;
            }
            if !visited.insert(node.id()) {
                continue;
            }
            let grad_fn = node.grad_fn();
            stack.push((node, true));
            if let Some(grad_fn) = grad_fn {
                for input in grad_fn.inputs() {
                    if !visited.contains(&input.id()) {
                        stack.push((input.clone(), false));
                    }
                }
            }
        }

        order.reverse();
        order
    }
}

impl<T: Clone + 'static> Differentiable<T> {
    /// 値のコピーを取得
    pub fn value(&self) -> T {
        self.0.lock().unwrap().value.clone()
    }
}

/// 逆伝播の結果、ノードに書き戻す内容
struct Commit<T: 'static> {
    node: Differentiable<T>,
    grad: Option<T>,
    consume_grad_fn: bool,
}

// T: GradNode の場合の実装
impl<T: GradNode> Differentiable<T> {
    /// 累積された勾配を取得
    pub fn grad(&self) -> Option<Differentiable<T>> {
        self.0.lock().unwrap().grad.clone()
    }

    /// 勾配をリセット
    pub fn zero_grad(&self) {
        self.0.lock().unwrap().grad = None;
    }

    /// 勾配を伝播
    ///
    /// ノードをトポロジカル順に処理し、各ノードに届いた勾配をすべて合算して
    /// から grad_fn を一度だけ呼ぶ。全ノードの勾配を計算し終えてから書き戻す
    /// ので、途中でエラーが起きた場合はどのノードも変更されない。
    ///
    /// 成功した逆伝播は grad_fn を消費する。同じ出力から二度目の逆伝播を
    /// 行っても入力側へは伝播しない。
    pub fn backward_with(&self, grad: Differentiable<T>) -> Result<(), AutogradError> {
        let order = self.topo_order();
        let mut pending: FxHashMap<usize, T> = FxHashMap::default();
        pending.insert(self.id(), grad.value());
        let mut commits = Vec::with_capacity(order.len());

        for node in order {
            let Some(grad) = pending.remove(&node.id()) else {
                continue;
            };
            let (grad_fn, accumulated) = {
                let inner = node.0.lock().unwrap();
                let accumulated = match (inner.requires_grad, &inner.grad) {
                    (false, _) => None,
                    (true, Some(existing)) => Some(existing.value().accumulate(&grad)?),
                    (true, None) => Some(grad.clone()),
                };
                (inner.grad_fn.clone(), accumulated)
            };

            if let Some(grad_fn) = &grad_fn {
                let inputs = grad_fn.inputs();
                let input_grads = grad_fn.backward(&grad)?;
                if input_grads.len() != inputs.len() {
                    return Err(AutogradError::ArityMismatch {
                        op: grad_fn.name(),
                        expected: inputs.len(),
                        found: input_grads.len(),
                    });
                }
                for (input, input_grad) in inputs.iter().zip(input_grads) {
                    match pending.entry(input.id()) {
                        Entry::Occupied(mut slot) => {
                            let sum = slot.get().accumulate(&input_grad)?;
                            slot.insert(sum);
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(input_grad);
                        }
                    }
                }
            }

            commits.push(Commit {
                node,
                grad: accumulated,
                consume_grad_fn: grad_fn.is_some(),
            });
        }

        for commit in commits {
            let mut inner = commit.node.0.lock().unwrap();
            if let Some(grad) = commit.grad {
                inner.grad = Some(Differentiable::new_no_grad(grad));
            }
            if commit.consume_grad_fn {
                inner.grad_fn = None;
            }
        }
        Ok(())
    }
}

// T: GradRoot の場合の追加実装
impl<T: GradRoot> Differentiable<T> {
    /// 初期勾配 1 で逆伝播を開始（高階微分なし）
    pub fn backward(&self) -> Result<(), AutogradError> {
        let seed = self.with_value(<T as GradRoot>::unit_grad_like);
        self.backward_with(Differentiable::new_no_grad(seed))
    }
}
