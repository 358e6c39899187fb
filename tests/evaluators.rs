use ckks_toolkit::{
    CkksCiphertext, CkksParams, DepthFinder, Evaluate, HeError, HomomorphicEval, NaiveBackend,
    OpCount, PlaintextEval, ScaleEstimator,
};
use approx::assert_relative_eq;
use std::sync::Arc;

type Ct = CkksCiphertext<NaiveBackend>;

/// Parameter set for metadata-only walks: a 4096-wide ring with a 20-bit
/// scale leaves room for a four-prime chain.
fn meta_params() -> Arc<CkksParams> {
    Arc::new(CkksParams::new(2048, 3, 20).unwrap())
}

fn front_loaded(params: &CkksParams, front: &[f64]) -> Vec<f64> {
    let mut values = vec![0.0; params.num_slots()];
    values[..front.len()].copy_from_slice(front);
    values
}

#[test]
fn depth_finder_two_rescaled_multiplies() {
    let params = meta_params();
    let eval = DepthFinder::new(params.clone());
    let zeros = vec![0.0; params.num_slots()];

    let mut ct: Ct = eval.encrypt(&zeros, None).unwrap();
    assert_eq!(ct.he_level(), 3);

    for _ in 0..2 {
        let other = ct.clone();
        eval.multiply_inplace(&mut ct, &other).unwrap();
        eval.relinearize_inplace(&mut ct).unwrap();
        eval.rescale_to_next_inplace(&mut ct).unwrap();
    }

    assert_eq!(ct.he_level(), 1);
    assert_eq!(eval.get_multiplicative_depth(), 2);
}

#[test]
fn plaintext_eval_add_plain_vec() {
    let params = Arc::new(CkksParams::new(4096, 3, 40).unwrap());
    let eval = PlaintextEval::new(params.clone());

    let values = front_loaded(&params, &[1.0, 2.0, 3.0, 4.0]);
    let plain = front_loaded(&params, &[10.0, 20.0, 30.0, 40.0]);

    let mut ct: Ct = eval.encrypt(&values, None).unwrap();
    eval.add_plain_vec_inplace(&mut ct, &plain).unwrap();

    let pt = ct.plaintext().unwrap();
    assert_eq!(&pt[..4], &[11.0, 22.0, 33.0, 44.0]);
    assert_eq!(ct.he_level(), 3);
    assert_eq!(ct.scale(), 2f64.powi(40));
}

#[test]
fn scale_estimator_square_then_rescale() {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let eval = ScaleEstimator::new(params.clone());

    let values = front_loaded(&params, &[5.0, -2.0, 1.0]);
    let mut ct: Ct = eval.encrypt(&values, None).unwrap();
    eval.square_inplace(&mut ct).unwrap();
    eval.rescale_to_next_inplace(&mut ct).unwrap();

    assert_relative_eq!(eval.get_exact_max_log_plain_val(), 25f64.log2());
    // ring dimension 4096 supports 218/2... the 2048-slot ring is 4096 wide
    let budget = 109.0;
    assert_relative_eq!(
        eval.get_estimated_max_log_scale(),
        budget - 25f64.log2() - 60.0
    );
    assert_eq!(eval.get_multiplicative_depth(), 1);
}

#[test]
fn scale_estimator_accepts_injected_bound() {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let eval = ScaleEstimator::new(params);
    // a no-op circuit never shows the estimator its inputs
    eval.update_plaintext_max_val(8.0);
    assert_relative_eq!(eval.get_exact_max_log_plain_val(), 3.0);
}

#[test]
fn opcount_mixed_circuit() {
    let params = meta_params();
    let eval = OpCount::new(params.clone());
    let zeros = vec![0.0; params.num_slots()];
    let top = params.max_level();

    let run = |eval: &OpCount| {
        let mut a: Ct = eval.encrypt(&zeros, None).unwrap();
        let b: Ct = eval.encrypt(&zeros, None).unwrap();
        eval.multiply_inplace(&mut a, &b).unwrap();

        let mut c: Ct = eval.encrypt(&zeros, None).unwrap();
        eval.rotate_left_inplace(&mut c, 1).unwrap();
        eval.add_inplace(&mut c, &b).unwrap();

        let mut d: Ct = eval.encrypt(&zeros, None).unwrap();
        eval.mod_down_to_level_inplace(&mut d, top - 2).unwrap();
    };

    run(&eval);
    let counts = eval.counts();
    assert_eq!(counts.multiplies, 1);
    assert_eq!(counts.additions, 2); // one explicit, one inside the rotation
    assert_eq!(counts.rotations, 1);
    assert_eq!(counts.mod_downs, 1);
    assert_eq!(counts.mod_down_levels, 2);
    assert_eq!(counts.negations, 0);

    // the same circuit after a reset produces identical counters
    eval.reset();
    assert_eq!(eval.counts(), Default::default());
    run(&eval);
    assert_eq!(eval.counts(), counts);
}

/// Run one circuit and record the (level, scale) pair after every step.
fn record_trajectory<E: Evaluate<NaiveBackend>>(eval: &E) -> Vec<(usize, f64)> {
    let params = eval.params().clone();
    let values = front_loaded(&params, &[1.5, -0.5, 2.0, 0.25]);
    let mut log = Vec::new();

    let mut a: Ct = eval.encrypt(&values, None).unwrap();
    let b: Ct = eval.encrypt(&values, None).unwrap();
    log.push((a.he_level(), a.scale()));

    eval.multiply_inplace(&mut a, &b).unwrap();
    log.push((a.he_level(), a.scale()));
    eval.relinearize_inplace(&mut a).unwrap();
    eval.rescale_to_next_inplace(&mut a).unwrap();
    log.push((a.he_level(), a.scale()));

    eval.add_plain_inplace(&mut a, 1.5).unwrap();
    log.push((a.he_level(), a.scale()));
    eval.rotate_left_inplace(&mut a, 2).unwrap();
    log.push((a.he_level(), a.scale()));
    eval.negate_inplace(&mut a).unwrap();

    let target = a.he_level() - 1;
    eval.mod_down_to_level_inplace(&mut a, target).unwrap();
    log.push((a.he_level(), a.scale()));

    log
}

#[test]
fn all_variants_share_the_metadata_trajectory() {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let backend = Arc::new(NaiveBackend::new(params.clone()));

    let depth = DepthFinder::new(params.clone());
    let ptxt = PlaintextEval::new(params.clone());
    let estimator = ScaleEstimator::new(params.clone());
    let opcount = OpCount::new(params.clone());
    let homomorphic = HomomorphicEval::new(backend, params.clone()).unwrap();

    let reference = record_trajectory(&depth);
    assert_eq!(record_trajectory(&ptxt), reference);
    assert_eq!(record_trajectory(&estimator), reference);
    assert_eq!(record_trajectory(&opcount), reference);
    // scales must match the backend's own view bit for bit
    assert_eq!(record_trajectory(&homomorphic), reference);
}

#[test]
fn homomorphic_multiply_and_rescale_decrypts_correctly() {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let backend = Arc::new(NaiveBackend::new(params.clone()));
    let eval = HomomorphicEval::new(backend, params.clone()).unwrap();

    let values = front_loaded(&params, &[1.5, -2.0, 3.0]);
    let mut ct: Ct = eval.encrypt(&values, None).unwrap();
    let other = ct.clone();
    eval.multiply_inplace(&mut ct, &other).unwrap();
    eval.relinearize_inplace(&mut ct).unwrap();
    eval.rescale_to_next_inplace(&mut ct).unwrap();

    let out = eval.decrypt(&ct).unwrap();
    assert_relative_eq!(out[0], 2.25, epsilon = 1e-5);
    assert_relative_eq!(out[1], 4.0, epsilon = 1e-5);
    assert_relative_eq!(out[2], 9.0, epsilon = 1e-5);
}

#[test]
fn multiply_by_zero_scalar_keeps_level_and_scale() {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let backend = Arc::new(NaiveBackend::new(params.clone()));
    let homomorphic = HomomorphicEval::new(backend, params.clone()).unwrap();
    let ptxt = PlaintextEval::new(params.clone());

    let values = front_loaded(&params, &[4.0, -1.0]);
    for_each_zero_case(&homomorphic, &values);
    for_each_zero_case(&ptxt, &values);

    let mut ct: Ct = homomorphic.encrypt(&values, None).unwrap();
    homomorphic.multiply_plain_inplace(&mut ct, 0.0).unwrap();
    let out = homomorphic.decrypt(&ct).unwrap();
    assert!(out.iter().all(|v| v.abs() < 1e-9));
}

fn for_each_zero_case<E: Evaluate<NaiveBackend>>(eval: &E, values: &[f64]) {
    let mut ct: Ct = eval.encrypt(values, None).unwrap();
    let (level, scale) = (ct.he_level(), ct.scale());
    eval.multiply_plain_inplace(&mut ct, 0.0).unwrap();
    assert_eq!(ct.he_level(), level);
    assert_eq!(ct.scale(), scale);

    let zeros = vec![0.0; values.len()];
    let mut ct: Ct = eval.encrypt(values, None).unwrap();
    eval.multiply_plain_vec_inplace(&mut ct, &zeros).unwrap();
    assert_eq!(ct.he_level(), level);
    assert_eq!(ct.scale(), scale);
}

#[test]
fn encryption_below_top_level_adjusts_the_scale() {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let eval = PlaintextEval::new(params.clone());
    let values = front_loaded(&params, &[1.0]);

    let ct: Ct = eval.encrypt(&values, Some(1)).unwrap();
    assert_eq!(ct.he_level(), 1);
    assert_eq!(ct.scale(), params.encryption_scale(1));

    // rescaling a top-level ciphertext lands on exactly that scale
    let mut top: Ct = eval.encrypt(&values, None).unwrap();
    eval.square_inplace(&mut top).unwrap();
    eval.rescale_to_next_inplace(&mut top).unwrap();
    assert_eq!(top.scale(), ct.scale());
}

#[test]
fn rotation_composition_matches_single_rotation() {
    let params = Arc::new(CkksParams::new(512, 0, 14).unwrap());
    let eval = PlaintextEval::new(params.clone());
    let values: Vec<f64> = (0..params.num_slots()).map(|i| (i % 31) as f64).collect();

    for (a, b) in [(1usize, 2usize), (3, 5), (100, 28), (17, 239)] {
        let ct: Ct = eval.encrypt(&values, None).unwrap();
        let composed = eval
            .rotate_left(&eval.rotate_left(&ct, a).unwrap(), b)
            .unwrap();
        let single = eval.rotate_left(&ct, a + b).unwrap();
        assert_eq!(composed.plaintext(), single.plaintext());
    }
}

#[test]
fn validation_errors() {
    let params = meta_params();
    let eval = DepthFinder::new(params.clone());
    let zeros = vec![0.0; params.num_slots()];

    // uninitialized operand
    let mut bad: Ct = CkksCiphertext::uninitialized();
    assert!(matches!(
        eval.negate_inplace(&mut bad),
        Err(HeError::Uninitialized { .. })
    ));

    // wrong input length
    assert!(matches!(
        eval.encrypt(&zeros[..3], None).map(|_: Ct| ()),
        Err(HeError::Shape { .. })
    ));

    // level above the chain top
    assert!(matches!(
        eval.encrypt(&zeros, Some(9)).map(|_: Ct| ()),
        Err(HeError::Parameter { .. })
    ));

    // rotation step bounds: 1..=num_slots/2
    let mut ct: Ct = eval.encrypt(&zeros, None).unwrap();
    assert!(matches!(
        eval.rotate_left_inplace(&mut ct, 0),
        Err(HeError::Parameter { .. })
    ));
    assert!(eval
        .rotate_left_inplace(&mut ct, params.num_slots() / 2)
        .is_ok());
    assert!(matches!(
        eval.rotate_left_inplace(&mut ct, params.num_slots() / 2 + 1),
        Err(HeError::Parameter { .. })
    ));

    // scale mismatch after an unbalanced multiply
    let mut a: Ct = eval.encrypt(&zeros, None).unwrap();
    let b: Ct = eval.encrypt(&zeros, None).unwrap();
    let other = a.clone();
    eval.multiply_inplace(&mut a, &other).unwrap();
    assert!(matches!(
        eval.add_inplace(&mut a, &b),
        Err(HeError::ScaleMismatch { .. })
    ));

    // level mismatch between operands
    let mut c: Ct = eval.encrypt(&zeros, None).unwrap();
    eval.mod_down_to_level_inplace(&mut c, 1).unwrap();
    assert!(matches!(
        eval.add_inplace(&mut c, &b),
        Err(HeError::LevelMismatch { .. })
    ));

    // cannot rescale off the bottom of the chain
    eval.mod_down_to_level_inplace(&mut c, 0).unwrap();
    assert!(matches!(
        eval.rescale_to_next_inplace(&mut c),
        Err(HeError::LevelMismatch { .. })
    ));

    // cannot mod-switch upward
    assert!(matches!(
        eval.mod_down_to_level_inplace(&mut c, 2),
        Err(HeError::LevelMismatch { .. })
    ));

    // metadata evaluators cannot decrypt
    assert!(matches!(
        eval.decrypt(&b),
        Err(HeError::Parameter { .. })
    ));
}

#[test]
fn depth_finder_reset_clears_depth() {
    let params = meta_params();
    let eval = DepthFinder::new(params.clone());
    let zeros = vec![0.0; params.num_slots()];

    let mut ct: Ct = eval.encrypt(&zeros, None).unwrap();
    eval.square_inplace(&mut ct).unwrap();
    eval.rescale_to_next_inplace(&mut ct).unwrap();
    assert_eq!(eval.get_multiplicative_depth(), 1);

    eval.reset();
    assert_eq!(eval.get_multiplicative_depth(), 0);
}
