use std::cell::Cell;

use autograd::{
    AutogradError, Differentiable, DuplicatePolicy, OpDef, OpKey, OpRegistry, OpSchema,
    RecordedOp, RegistryConfig,
};
use ndarray::{ArrayD, array};
use rstest::rstest;

// ============================================================================
// テスト用の演算
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TestOp {
    Square,
    Mul,
    Broken,
}

impl OpKey for TestOp {
    fn name(&self) -> &'static str {
        match self {
            TestOp::Square => "Square",
            TestOp::Mul => "Mul",
            TestOp::Broken => "Broken",
        }
    }
}

// 勾配関数の呼び出し回数（テストはスレッドごとに走るのでスレッドローカル）
thread_local! {
    static SQUARE_GRAD_CALLS: Cell<usize> = const { Cell::new(0) };
}

fn square_forward(inputs: &[&f64]) -> Result<f64, AutogradError> {
    Ok(inputs[0] * inputs[0])
}

fn square_gradient(op: &RecordedOp<TestOp, f64>, grad: &f64) -> Result<Vec<f64>, AutogradError> {
    SQUARE_GRAD_CALLS.with(|calls| calls.set(calls.get() + 1));
    let x = op.input(0)?;
    Ok(vec![2.0 * x * grad])
}

fn square_def() -> OpDef<TestOp, f64> {
    OpDef {
        schema: OpSchema {
            gradient_name: "SquareGrad",
            num_inputs: 1,
            doc: "x * x",
        },
        forward: square_forward,
        gradient: square_gradient,
    }
}

fn mul_forward(inputs: &[&f64]) -> Result<f64, AutogradError> {
    Ok(inputs[0] * inputs[1])
}

fn mul_gradient(op: &RecordedOp<TestOp, f64>, grad: &f64) -> Result<Vec<f64>, AutogradError> {
    let lhs = op.input(0)?;
    let rhs = op.input(1)?;
    Ok(vec![rhs * grad, lhs * grad])
}

fn mul_def() -> OpDef<TestOp, f64> {
    OpDef {
        schema: OpSchema {
            gradient_name: "MulGrad",
            num_inputs: 2,
            doc: "lhs * rhs",
        },
        forward: mul_forward,
        gradient: mul_gradient,
    }
}

// 入力は1つなのに勾配を2つ返す
fn broken_gradient(_op: &RecordedOp<TestOp, f64>, grad: &f64) -> Result<Vec<f64>, AutogradError> {
    Ok(vec![*grad, *grad])
}

fn broken_def() -> OpDef<TestOp, f64> {
    OpDef {
        schema: OpSchema {
            gradient_name: "BrokenGrad",
            num_inputs: 1,
            doc: "identity with a faulty gradient",
        },
        forward: |inputs| Ok(*inputs[0]),
        gradient: broken_gradient,
    }
}

fn registry_with(policy: DuplicatePolicy) -> OpRegistry<TestOp, f64> {
    let config = RegistryConfig::builder().duplicate_policy(policy).build();
    let mut registry = OpRegistry::with_config(config);
    registry.register(TestOp::Square, square_def()).unwrap();
    registry.register(TestOp::Mul, mul_def()).unwrap();
    registry
}

// ============================================================================
// 登録
// ============================================================================

#[test]
fn test_register_and_lookup() {
    let _ = env_logger::builder().is_test(true).try_init();
    let registry = registry_with(DuplicatePolicy::Reject);
    assert_eq!(registry.len(), 2);
    assert!(registry.contains(TestOp::Square));
    assert!(!registry.contains(TestOp::Broken));

    let def = registry.get(TestOp::Square).unwrap();
    assert_eq!(def.schema.gradient_name, "SquareGrad");
    assert_eq!(def.schema.num_inputs, 1);
}

#[test]
fn test_default_policy_rejects_duplicates() {
    let mut registry = OpRegistry::<TestOp, f64>::new();
    assert_eq!(registry.config().duplicate_policy, DuplicatePolicy::Reject);

    registry.register(TestOp::Square, square_def()).unwrap();
    let err = registry.register(TestOp::Square, mul_def()).unwrap_err();
    assert!(matches!(
        err,
        AutogradError::DuplicateRegistration { op: "Square" }
    ));
    // 既存の定義が残っている
    assert_eq!(
        registry.get(TestOp::Square).unwrap().schema.gradient_name,
        "SquareGrad"
    );
}

#[test]
fn test_replace_policy_overwrites() {
    let mut registry = registry_with(DuplicatePolicy::Replace);
    registry.register(TestOp::Square, mul_def()).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(
        registry.get(TestOp::Square).unwrap().schema.gradient_name,
        "MulGrad"
    );
}

#[test]
fn test_ignore_policy_keeps_first() {
    let mut registry = registry_with(DuplicatePolicy::Ignore);
    registry.register(TestOp::Square, mul_def()).unwrap();
    assert_eq!(
        registry.get(TestOp::Square).unwrap().schema.gradient_name,
        "SquareGrad"
    );
}

#[rstest]
fn test_duplicate_registration_calls_gradient_once(
    #[values(DuplicatePolicy::Replace, DuplicatePolicy::Ignore)] policy: DuplicatePolicy,
) {
    let mut registry = OpRegistry::with_config(
        RegistryConfig::builder().duplicate_policy(policy).build(),
    );
    registry.register(TestOp::Square, square_def()).unwrap();
    registry.register(TestOp::Square, square_def()).unwrap();

    let x = Differentiable::new(3.0_f64);
    let y = registry.apply(TestOp::Square, &[&x]).unwrap();

    let before = SQUARE_GRAD_CALLS.with(Cell::get);
    y.backward().unwrap();
    let after = SQUARE_GRAD_CALLS.with(Cell::get);

    assert_eq!(after - before, 1);
    assert_eq!(x.grad().unwrap().value(), 6.0);
}

// ============================================================================
// 適用と逆伝播
// ============================================================================

#[test]
fn test_apply_and_backward() {
    let registry = registry_with(DuplicatePolicy::Reject);
    let x = Differentiable::new(3.0_f64);
    let y = registry.apply(TestOp::Square, &[&x]).unwrap();
    assert_eq!(y.value(), 9.0);
    assert!(y.has_grad_fn());

    y.backward().unwrap();
    assert_eq!(x.grad().unwrap().value(), 6.0);
}

#[test]
fn test_chain_rule_through_two_ops() {
    // z = (x * y)^2, ∂z/∂x = 2xy * y, ∂z/∂y = 2xy * x
    let registry = registry_with(DuplicatePolicy::Reject);
    let x = Differentiable::new(2.0_f64);
    let y = Differentiable::new(5.0_f64);
    let xy = registry.apply(TestOp::Mul, &[&x, &y]).unwrap();
    let z = registry.apply(TestOp::Square, &[&xy]).unwrap();
    assert_eq!(z.value(), 100.0);

    z.backward().unwrap();
    assert_eq!(x.grad().unwrap().value(), 100.0);
    assert_eq!(y.grad().unwrap().value(), 40.0);
}

#[test]
fn test_diamond_sums_gradients_before_backward() {
    // a = x^2, z = a * a = x^4, ∂z/∂x = 4x^3
    let registry = registry_with(DuplicatePolicy::Reject);
    let x = Differentiable::new(2.0_f64);
    let a = registry.apply(TestOp::Square, &[&x]).unwrap();
    let z = registry.apply(TestOp::Mul, &[&a, &a]).unwrap();
    assert_eq!(z.value(), 16.0);

    let before = SQUARE_GRAD_CALLS.with(Cell::get);
    z.backward().unwrap();
    let after = SQUARE_GRAD_CALLS.with(Cell::get);

    assert_eq!(a.grad().unwrap().value(), 8.0);
    assert_eq!(x.grad().unwrap().value(), 32.0);
    // a に届いた2つの勾配を合算してから一度だけ
    assert_eq!(after - before, 1);
}

#[test]
fn test_apply_without_grad_records_nothing() {
    let registry = registry_with(DuplicatePolicy::Reject);
    let x = Differentiable::new_no_grad(3.0_f64);
    let y = registry.apply(TestOp::Square, &[&x]).unwrap();
    assert_eq!(y.value(), 9.0);
    assert!(!y.has_grad_fn());
    assert!(!y.requires_grad());
}

#[test]
fn test_apply_unknown_op() {
    let registry = registry_with(DuplicatePolicy::Reject);
    let x = Differentiable::new(1.0_f64);
    let err = registry.apply(TestOp::Broken, &[&x]).unwrap_err();
    assert!(matches!(err, AutogradError::UnknownOp { op: "Broken" }));
}

#[test]
fn test_apply_wrong_arity() {
    let registry = registry_with(DuplicatePolicy::Reject);
    let x = Differentiable::new(1.0_f64);
    let err = registry.apply(TestOp::Mul, &[&x]).unwrap_err();
    assert!(matches!(
        err,
        AutogradError::ArityMismatch {
            op: "Mul",
            expected: 2,
            found: 1
        }
    ));
}

#[test]
fn test_gradient_arity_is_checked() {
    let mut registry = OpRegistry::new();
    registry.register(TestOp::Broken, broken_def()).unwrap();
    let x = Differentiable::new(1.0_f64);
    let y = registry.apply(TestOp::Broken, &[&x]).unwrap();

    let err = y.backward().unwrap_err();
    assert!(matches!(
        err,
        AutogradError::ArityMismatch {
            op: "Broken",
            expected: 1,
            found: 2
        }
    ));
    // 失敗した逆伝播は何も書き換えない
    assert!(x.grad().is_none());
    assert!(y.grad().is_none());
    assert!(y.has_grad_fn());
}

// ============================================================================
// ndarray
// ============================================================================

fn sum_sq_forward(inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, AutogradError> {
    Ok(inputs[0].mapv(|v| v * v))
}

fn sum_sq_gradient(
    op: &RecordedOp<TestOp, ArrayD<f64>>,
    grad: &ArrayD<f64>,
) -> Result<Vec<ArrayD<f64>>, AutogradError> {
    let x = op.input(0)?;
    Ok(vec![x * 2.0 * grad])
}

#[test]
fn test_array_gradient_accumulates() {
    let mut registry = OpRegistry::<TestOp, ArrayD<f64>>::new();
    registry
        .register(
            TestOp::Square,
            OpDef {
                schema: OpSchema {
                    gradient_name: "SquareGrad",
                    num_inputs: 1,
                    doc: "x * x",
                },
                forward: sum_sq_forward,
                gradient: sum_sq_gradient,
            },
        )
        .unwrap();

    let x = Differentiable::new(array![1.0, 2.0, 3.0].into_dyn());
    let a = registry.apply(TestOp::Square, &[&x]).unwrap();
    let b = registry.apply(TestOp::Square, &[&x]).unwrap();
    a.backward().unwrap();
    b.backward().unwrap();

    assert_eq!(
        x.grad().unwrap().value(),
        array![4.0, 8.0, 12.0].into_dyn()
    );
}
