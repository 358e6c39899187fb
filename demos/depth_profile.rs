//! Circuit profiling demonstration.
//!
//! Writes a small polynomial-evaluation circuit once, then runs it under
//! three metadata evaluators to answer the questions a CKKS deployment has
//! to settle before touching key material:
//!
//!   1. How deep is the circuit? (DepthFinder — sizes the modulus chain)
//!   2. How many of each primitive does it perform? (OpCount)
//!   3. How large can the encoding scale safely be? (ScaleEstimator)

use ckks_toolkit::{
    CkksCiphertext, CkksParams, DepthFinder, Evaluate, NaiveBackend, OpCount, ScaleEstimator,
};
use std::sync::Arc;

type Ct = CkksCiphertext<NaiveBackend>;

/// Evaluates x⁴ + 2x² + 0.5 slot-wise, rescaling after every product.
fn circuit<E: Evaluate<NaiveBackend>>(eval: &E, input: &[f64]) -> Ct {
    let x: Ct = eval.encrypt(input, None).expect("encrypt");

    // x²
    let mut x2 = eval.square(&x).expect("square");
    eval.relinearize_inplace(&mut x2).expect("relinearize");
    eval.rescale_to_next_inplace(&mut x2).expect("rescale");

    // x⁴
    let mut x4 = eval.square(&x2).expect("square");
    eval.relinearize_inplace(&mut x4).expect("relinearize");
    eval.rescale_to_next_inplace(&mut x4).expect("rescale");

    // 2x², brought down to x⁴'s chain position
    let mut term = eval.multiply_plain(&x2, 2.0).expect("multiply_plain");
    eval.rescale_to_next_inplace(&mut term).expect("rescale");

    let mut acc = x4;
    eval.add_inplace(&mut acc, &term).expect("add");
    eval.add_plain_inplace(&mut acc, 0.5).expect("add_plain");
    acc
}

fn main() {
    let params = Arc::new(CkksParams::new(2048, 3, 25).expect("params"));
    println!("ring dimension     : {}", params.poly_degree());
    println!("plaintext slots    : {}", params.num_slots());
    println!("modulus chain      : {} primes near 2^{}", params.primes().len(), params.log_scale());
    println!();

    let input: Vec<f64> = (0..params.num_slots())
        .map(|i| ((i % 9) as f64 - 4.0) / 4.0)
        .collect();

    // 1. multiplicative depth
    let depth_finder = DepthFinder::new(params.clone());
    circuit(&depth_finder, &input);
    println!("multiplicative depth : {}", depth_finder.get_multiplicative_depth());

    // 2. operation counts
    let op_count = OpCount::new(params.clone());
    circuit(&op_count, &input);
    let counts = op_count.counts();
    println!("multiplies           : {}", counts.multiplies);
    println!("additions            : {}", counts.additions);
    println!("rotations            : {}", counts.rotations);

    // 3. scale bound
    let estimator = ScaleEstimator::new(params.clone());
    let result = circuit(&estimator, &input);
    println!(
        "max |plaintext|      : 2^{:.3}",
        estimator.get_exact_max_log_plain_val()
    );
    println!(
        "max safe log2(scale) : {:.3}",
        estimator.get_estimated_max_log_scale()
    );
    println!(
        "final level / scale  : {} / 2^{:.3}",
        result.he_level(),
        result.scale().log2()
    );
}
