use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tapegrad::config::{get_kernel, set_kernel, Kernel, PARALLEL_THRESHOLD};
use tapegrad::tensors::{broadcast_shape, Tensor};
use tapegrad::value::Value;
use tapegrad::tensor;

#[test]
fn test_tensor_creation() {
    let t = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(t.shape, vec![2, 2]);
    assert_eq!(t.data, vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(t.numel(), 4);
    assert!(!t.is_scalar());
}

#[test]
fn test_tensor_macro() {
    let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    assert_eq!(t.shape, vec![2, 2]);
    assert_eq!(t.data, vec![1.0, 2.0, 3.0, 4.0]);

    let s = tensor!(5.0);
    assert!(s.shape.is_empty());
    assert_eq!(s.item(), Some(5.0));
}

#[test]
fn test_tensor_macro_accepts_negative_literals() {
    let flat = tensor!([1.0, -2.0, -0.5]);
    assert_eq!(flat.shape, vec![3]);
    assert_eq!(flat.data, vec![1.0, -2.0, -0.5]);

    let nested = tensor!([[-1.0, 2.0, -3.5], [0.0, -4.0, 9.0]]);
    assert_eq!(nested.shape, vec![2, 3]);
    assert_eq!(nested.data, vec![-1.0, 2.0, -3.5, 0.0, -4.0, 9.0]);

    let cube = tensor!([[[-1.0], [2.0]], [[3.0], [-4.0]]]);
    assert_eq!(cube.shape, vec![2, 2, 1]);
    assert_eq!(cube.data, vec![-1.0, 2.0, 3.0, -4.0]);

    assert_eq!(tensor!(-5.0).item(), Some(-5.0));
}

#[test]
#[should_panic(expected = "ragged")]
fn test_tensor_macro_rejects_ragged_rows() {
    let _ = tensor!([[1.0, 2.0], [3.0]]);
}

#[test]
#[should_panic]
fn test_tensor_rejects_wrong_element_count() {
    let _ = Tensor::new(vec![2, 3], vec![1.0; 5]);
}

#[test]
fn test_reductions() {
    let t = tensor!([3.0, 4.0]);
    assert_eq!(t.sum(), 7.0);
    assert_eq!(t.norm(), 5.0);
    assert_eq!(t.item(), None);
}

#[test]
fn test_seeded_randn_is_reproducible() {
    let a = Tensor::randn_with_rng(vec![4, 4], &mut StdRng::seed_from_u64(7));
    let b = Tensor::randn_with_rng(vec![4, 4], &mut StdRng::seed_from_u64(7));
    assert_eq!(a, b);
    assert_eq!(a.shape, vec![4, 4]);
    assert!(a.data.iter().all(|v| v.is_finite()));
}

#[test]
fn test_broadcast_shape_allows_single_element_only() {
    assert_eq!(broadcast_shape(&[2, 2], &[2, 2]), Some(vec![2, 2]));
    assert_eq!(broadcast_shape(&[1], &[3, 2]), Some(vec![3, 2]));
    assert_eq!(broadcast_shape(&[3, 2], &[]), Some(vec![3, 2]));
    assert_eq!(broadcast_shape(&[2], &[3]), None);
}

#[test]
fn test_try_ops_report_shape_mismatch() {
    let a = Value::leaf(Tensor::ones(vec![2]));
    let b = Value::leaf(Tensor::ones(vec![3]));
    let err = a.try_mul(&b).unwrap_err();
    assert!(err.to_string().contains("shape mismatch"));
    assert!(a.try_add(&Value::constant(Tensor::scalar(1.0))).is_ok());
}

#[test]
fn test_display_matches_nested_layout() {
    let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    assert_eq!(
        t.to_string(),
        "tensor([[1.0000, 2.0000],\n        [3.0000, 4.0000]])"
    );
    let x = Value::leaf(tensor!([1.0]));
    assert!((&x + 2.0).to_string().ends_with("grad_fn=<AddBackward>"));
}

#[test]
fn test_serial_and_parallel_kernels_agree() {
    let n = PARALLEL_THRESHOLD * 2;
    let data: Vec<f64> = (0..n).map(|i| (i as f64) * 1e-4 - 1.0).collect();

    let run = |kernel| {
        set_kernel(kernel);
        assert_eq!(get_kernel(), kernel);
        let x = Value::leaf(Tensor::new(vec![n], data.clone()));
        let out = (x.tanh() * &x).mean();
        out.backward().unwrap();
        let value = out.data().data[0];
        (value, x.grad().unwrap())
    };

    let (serial_out, serial_grad) = run(Kernel::Serial);
    let (parallel_out, parallel_grad) = run(Kernel::Parallel);
    assert_eq!(serial_grad, parallel_grad);
    assert!((serial_out - parallel_out).abs() < 1e-9);
}

proptest! {
    #[test]
    fn prop_add_constant_grad_is_ones(
        data in prop::collection::vec(-1e3f64..1e3, 1..32),
        c in -1e3f64..1e3,
    ) {
        let n = data.len();
        let x = Value::leaf(Tensor::new(vec![n], data));
        let y = &x + c;
        y.backward_with_seed(Tensor::ones(vec![n])).unwrap();
        prop_assert_eq!(x.grad().unwrap().data, vec![1.0; n]);
    }

    #[test]
    fn prop_mean_grad_is_uniform(data in prop::collection::vec(-1e3f64..1e3, 1..32)) {
        let n = data.len();
        let x = Value::leaf(Tensor::new(vec![n], data));
        x.mean().backward().unwrap();
        let grad = x.grad().unwrap();
        for g in grad.data {
            prop_assert!((g - 1.0 / n as f64).abs() < 1e-15);
        }
    }

    #[test]
    fn prop_repeated_passes_accumulate(
        data in prop::collection::vec(-10f64..10.0, 1..16),
        passes in 1usize..5,
    ) {
        let n = data.len();
        let x = Value::leaf(Tensor::new(vec![n], data.clone()));
        for _ in 0..passes {
            (&x * &x).sum().backward().unwrap();
        }
        let grad = x.grad().unwrap();
        for (g, v) in grad.data.iter().zip(&data) {
            prop_assert!((g - 2.0 * v * passes as f64).abs() < 1e-9);
        }
    }
}
