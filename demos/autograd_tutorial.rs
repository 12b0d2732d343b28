use tapegrad::backprop::BackwardOptions;
use tapegrad::tensors::Tensor;
use tapegrad::value::Value;
use tapegrad::{tensor, GradError};

fn main() -> Result<(), GradError> {
    // RUST_LOG=tapegrad=trace shows every backward step
    let _ = env_logger::builder().try_init();

    // a leaf that tracks gradients
    let x = Value::new(Tensor::ones(vec![2, 2]), true);
    println!("x = {x}");

    let y = &x + 2.0;
    println!("y = {y}");
    println!("y.grad_fn = {:?}", y.grad_fn_name());

    let z = &y * &y * 3.0;
    let out = z.mean();
    println!("z = {z}");
    println!("out = {out}");

    out.backward()?;
    if let Some(grad) = x.grad() {
        println!("d(out)/dx = {grad}");
    }

    // second pass over a released graph
    match out.backward() {
        Ok(()) => println!("unexpected: graph was still alive"),
        Err(e) => println!("second backward: {e}"),
    }

    // non-scalar root: keep doubling until the norm passes 1000
    let x = Value::leaf(Tensor::randn(vec![3]));
    let mut y = &x * 2.0;
    while y.data().norm() < 1000.0 {
        y = &y * 2.0;
    }
    println!("y = {y}");

    if let Err(e) = y.backward() {
        println!("default seed on a vector: {e}");
    }
    y.backward_with_seed(tensor!([0.1, 1.0, 0.0001]))?;
    if let Some(grad) = x.grad() {
        println!("x.grad = {grad}");
    }

    // retained graph, walked twice
    let x = Value::leaf(Tensor::ones(vec![2, 2]));
    let y = &x + 2.0;
    y.backward_with(Some(Tensor::ones(vec![2, 2])), BackwardOptions::retained())?;
    if let Some(grad) = x.grad() {
        println!("after first pass: {grad}");
    }

    let z = &y * &y;
    z.backward_with_seed(Tensor::randn(vec![2, 2]))?;
    if let Some(grad) = x.grad() {
        println!("after second pass: {grad}");
    }

    Ok(())
}
