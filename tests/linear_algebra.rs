use ckks_toolkit::{
    CkksParams, CtContainer, DebugEval, Encoding, Evaluate, HeError, HomomorphicEval,
    LinearAlgebra, Matrix, MAX_NORM, NaiveBackend, PlaintextEval, relative_diff_2norm,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;

fn random_matrix(rng: &mut ChaCha20Rng, height: usize, width: usize) -> Matrix {
    Matrix::new(
        height,
        width,
        ckks_toolkit::random_vector(rng, height * width, 2.0),
    )
    .unwrap()
}

fn mat_vec(mat: &Matrix, vec: &[f64]) -> Vec<f64> {
    (0..mat.height())
        .map(|r| (0..mat.width()).map(|c| mat.get(r, c) * vec[c]).sum())
        .collect()
}

fn vec_mat(vec: &[f64], mat: &Matrix) -> Vec<f64> {
    (0..mat.width())
        .map(|c| (0..mat.height()).map(|r| vec[r] * mat.get(r, c)).sum())
        .collect()
}

fn mat_mat(a: &Matrix, b: &Matrix, scalar: f64) -> Matrix {
    let mut data = Vec::with_capacity(a.height() * b.width());
    for r in 0..a.height() {
        for c in 0..b.width() {
            let cell: f64 = (0..a.width()).map(|k| a.get(r, k) * b.get(k, c)).sum();
            data.push(cell * scalar);
        }
    }
    Matrix::new(a.height(), b.width(), data).unwrap()
}

fn assert_close(expected: &[f64], actual: &[f64]) {
    match relative_diff_2norm(expected, actual).unwrap() {
        Some(diff) => assert!(diff < MAX_NORM, "relative 2-norm {diff} too large"),
        None => {}
    }
}

#[test]
fn row_vector_tiles_broadcast_down() {
    // the 4-entry vector splits into two chunks along the unit width, each
    // repeated down its tile's rows
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let eval = PlaintextEval::new(params.clone());
    let la: LinearAlgebra<NaiveBackend, _> = LinearAlgebra::new(&eval);

    let unit = la.make_unit(1024).unwrap(); // 1024x2
    let enc = la
        .encrypt_row_vector(&[1.0, 2.0, 3.0, 4.0], unit, None)
        .unwrap();
    assert_eq!(enc.num_units(), 2);

    let first = enc.cts()[0].plaintext().unwrap();
    let second = enc.cts()[1].plaintext().unwrap();
    for k in 0..unit.encoding_height() {
        assert_eq!(&first[2 * k..2 * k + 2], &[1.0, 2.0]);
        assert_eq!(&second[2 * k..2 * k + 2], &[3.0, 4.0]);
    }

    assert_eq!(
        la.decrypt_row_vector(&enc).unwrap(),
        vec![1.0, 2.0, 3.0, 4.0]
    );
}

#[test]
fn container_roundtrips() {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let backend = Arc::new(NaiveBackend::new(params.clone()));
    let eval = HomomorphicEval::new(backend, params.clone()).unwrap();
    let la = LinearAlgebra::new(&eval);
    let mut rng = ChaCha20Rng::seed_from_u64(42);

    let unit = la.make_unit(64).unwrap(); // 64x32

    let row = ckks_toolkit::random_vector(&mut rng, 50, 3.0);
    let enc_row = la.encrypt_row_vector(&row, unit, None).unwrap();
    assert_close(&row, &la.decrypt_row_vector(&enc_row).unwrap());

    let col = ckks_toolkit::random_vector(&mut rng, 70, 3.0);
    let enc_col = la.encrypt_col_vector(&col, unit, None).unwrap();
    assert_eq!(enc_col.num_units(), 2);
    assert_close(&col, &la.decrypt_col_vector(&enc_col).unwrap());

    let mat = random_matrix(&mut rng, 70, 40);
    let enc_mat = la.encrypt_matrix(&mat, unit, None).unwrap();
    assert_eq!(enc_mat.num_vertical_units(), 2);
    assert_eq!(enc_mat.num_horizontal_units(), 2);
    let back = la.decrypt_matrix(&enc_mat).unwrap();
    assert_close(mat.data(), back.data());
}

#[test]
fn componentwise_operations() {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let backend = Arc::new(NaiveBackend::new(params.clone()));
    let eval = DebugEval::new(backend, params.clone()).unwrap();
    let la = LinearAlgebra::new(&eval);
    let mut rng = ChaCha20Rng::seed_from_u64(7);

    let unit = la.make_unit(64).unwrap();
    let m1 = random_matrix(&mut rng, 20, 33);
    let m2 = random_matrix(&mut rng, 20, 33);

    let e1 = la.encrypt_matrix(&m1, unit, None).unwrap();
    let e2 = la.encrypt_matrix(&m2, unit, None).unwrap();

    // addition, subtraction, add_many
    let sum = la.add(&e1, &e2).unwrap();
    let expected: Vec<f64> = m1.data().iter().zip(m2.data()).map(|(a, b)| a + b).collect();
    assert_close(&expected, la.decrypt_matrix(&sum).unwrap().data());

    let diff = la.sub(&e1, &e2).unwrap();
    let expected: Vec<f64> = m1.data().iter().zip(m2.data()).map(|(a, b)| a - b).collect();
    assert_close(&expected, la.decrypt_matrix(&diff).unwrap().data());

    let many = la.add_many(&[e1.clone(), e2.clone(), e1.clone()]).unwrap();
    let expected: Vec<f64> = m1
        .data()
        .iter()
        .zip(m2.data())
        .map(|(a, b)| 2.0 * a + b)
        .collect();
    assert_close(&expected, la.decrypt_matrix(&many).unwrap().data());

    // plaintext addition and scalar multiplication
    let mut shifted = e1.clone();
    la.add_plain_matrix_inplace(&mut shifted, &m2).unwrap();
    let expected: Vec<f64> = m1.data().iter().zip(m2.data()).map(|(a, b)| a + b).collect();
    assert_close(&expected, la.decrypt_matrix(&shifted).unwrap().data());

    let scaled = la.multiply_plain(&e1, -1.5).unwrap();
    let expected: Vec<f64> = m1.data().iter().map(|a| a * -1.5).collect();
    assert_close(&expected, la.decrypt_matrix(&scaled).unwrap().data());

    let zeroed = la.multiply_plain(&e1, 0.0).unwrap();
    assert_eq!(zeroed.he_level(), e1.he_level());
    assert_eq!(zeroed.scale(), e1.scale());
    assert!(la
        .decrypt_matrix(&zeroed)
        .unwrap()
        .data()
        .iter()
        .all(|v| v.abs() < 1e-6));

    // hadamard product
    let prod = la.hadamard_multiply(&e1, &e2).unwrap();
    let expected: Vec<f64> = m1.data().iter().zip(m2.data()).map(|(a, b)| a * b).collect();
    assert_close(&expected, la.decrypt_matrix(&prod).unwrap().data());

    let squared = la.hadamard_square(&e1).unwrap();
    let expected: Vec<f64> = m1.data().iter().map(|a| a * a).collect();
    assert_close(&expected, la.decrypt_matrix(&squared).unwrap().data());
}

#[test]
fn sum_reductions() {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let backend = Arc::new(NaiveBackend::new(params.clone()));
    let eval = DebugEval::new(backend, params.clone()).unwrap();
    let la = LinearAlgebra::new(&eval);
    let mut rng = ChaCha20Rng::seed_from_u64(99);

    let unit = la.make_unit(64).unwrap();
    let mat = random_matrix(&mut rng, 70, 40); // 2x2 grid of tiles
    let enc = la.encrypt_matrix(&mat, unit, None).unwrap();

    // sum over rows gives the vector of column totals
    let rows_summed = la.sum_rows(&enc).unwrap();
    let expected: Vec<f64> = (0..mat.width())
        .map(|c| (0..mat.height()).map(|r| mat.get(r, c)).sum())
        .collect();
    assert_close(&expected, &la.decrypt_row_vector(&rows_summed).unwrap());
    assert_eq!(rows_summed.he_level(), enc.he_level());
    assert_eq!(rows_summed.scale(), enc.scale());

    // sum over columns gives the scaled vector of row totals
    let cols_summed = la.sum_cols(&enc, 2.0).unwrap();
    let expected: Vec<f64> = (0..mat.height())
        .map(|r| 2.0 * (0..mat.width()).map(|c| mat.get(r, c)).sum::<f64>())
        .collect();
    assert_close(&expected, &la.decrypt_col_vector(&cols_summed).unwrap());
    assert_eq!(cols_summed.he_level(), enc.he_level());

    // the _many forms match the sum of individual reductions
    let mat2 = random_matrix(&mut rng, 70, 24);
    let enc2 = la.encrypt_matrix(&mat2, unit, None).unwrap();
    let combined = la.sum_cols_many(&[enc.clone(), enc2.clone()], 1.0).unwrap();
    let expected: Vec<f64> = (0..mat.height())
        .map(|r| {
            (0..mat.width()).map(|c| mat.get(r, c)).sum::<f64>()
                + (0..mat2.width()).map(|c| mat2.get(r, c)).sum::<f64>()
        })
        .collect();
    assert_close(&expected, &la.decrypt_col_vector(&combined).unwrap());

    let mat3 = random_matrix(&mut rng, 30, 40);
    let enc3 = la.encrypt_matrix(&mat3, unit, None).unwrap();
    let combined = la.sum_rows_many(&[enc.clone(), enc3.clone()]).unwrap();
    let expected: Vec<f64> = (0..mat.width())
        .map(|c| {
            (0..mat.height()).map(|r| mat.get(r, c)).sum::<f64>()
                + (0..mat3.height()).map(|r| mat3.get(r, c)).sum::<f64>()
        })
        .collect();
    assert_close(&expected, &la.decrypt_row_vector(&combined).unwrap());
}

#[test]
fn vector_collapses_and_dot_product() {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let backend = Arc::new(NaiveBackend::new(params.clone()));
    let eval = DebugEval::new(backend, params.clone()).unwrap();
    let la = LinearAlgebra::new(&eval);
    let mut rng = ChaCha20Rng::seed_from_u64(3);

    let unit = la.make_unit(64).unwrap();
    let u = ckks_toolkit::random_vector(&mut rng, 50, 2.0);
    let v = ckks_toolkit::random_vector(&mut rng, 50, 2.0);

    let enc_u = la.encrypt_row_vector(&u, unit, None).unwrap();
    let total = la.sum_row_vector(&enc_u).unwrap();
    let slots = eval.decrypt(&total).unwrap();
    let expected: f64 = u.iter().sum();
    assert!((slots[0] - expected).abs() < 1e-3);

    let col = la.encrypt_col_vector(&v, unit, None).unwrap();
    let total = la.sum_col_vector(&col).unwrap();
    let slots = eval.decrypt(&total).unwrap();
    let expected: f64 = v.iter().sum();
    assert!((slots[0] - expected).abs() < 1e-3);

    let enc_v = la.encrypt_row_vector(&v, unit, None).unwrap();
    let dot = la.dot_product(&enc_u, &enc_v).unwrap();
    let slots = eval.decrypt(&dot).unwrap();
    let expected: f64 = u.iter().zip(&v).map(|(a, b)| a * b).sum();
    assert!((slots[0] - expected).abs() < 1e-3);
}

#[test]
fn matrix_vector_products() {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let backend = Arc::new(NaiveBackend::new(params.clone()));
    let eval = DebugEval::new(backend, params.clone()).unwrap();
    let la = LinearAlgebra::new(&eval);
    let mut rng = ChaCha20Rng::seed_from_u64(11);

    let unit = la.make_unit(64).unwrap();
    let mat = random_matrix(&mut rng, 70, 40);

    // A · v with v packed as a row vector
    let v = ckks_toolkit::random_vector(&mut rng, 40, 2.0);
    let enc_mat = la.encrypt_matrix(&mat, unit, None).unwrap();
    let enc_v = la.encrypt_row_vector(&v, unit, None).unwrap();
    let out = la.multiply_matrix_vector(&enc_mat, &enc_v).unwrap();
    assert_eq!(out.he_level(), enc_mat.he_level() - 1);
    assert_close(&mat_vec(&mat, &v), &la.decrypt_col_vector(&out).unwrap());

    // vᵀ · A with v packed as a column vector
    let v = ckks_toolkit::random_vector(&mut rng, 70, 2.0);
    let enc_v = la.encrypt_col_vector(&v, unit, None).unwrap();
    let out = la.multiply_vector_matrix(&enc_v, &enc_mat).unwrap();
    assert_eq!(out.he_level(), enc_mat.he_level());
    assert_close(&vec_mat(&v, &mat), &la.decrypt_row_vector(&out).unwrap());
}

#[test]
fn matrix_matrix_product() {
    let params = Arc::new(CkksParams::new(4096, 4, 40).unwrap());
    let backend = Arc::new(NaiveBackend::new(params.clone()));
    let eval = DebugEval::new(backend, params.clone()).unwrap();
    let la = LinearAlgebra::new(&eval);
    let mut rng = ChaCha20Rng::seed_from_u64(23);

    let unit = la.make_unit(64).unwrap();
    let a = random_matrix(&mut rng, 3, 4);
    let b = random_matrix(&mut rng, 4, 5);
    let scalar = 0.5;

    // right operand supplied transposed, one level above the left
    let enc_b_t = la.encrypt_matrix(&b.transposed(), unit, None).unwrap();
    let enc_a = la
        .encrypt_matrix(&a, unit, Some(params.max_level() - 1))
        .unwrap();

    let out = la.multiply_matrix(&enc_a, &enc_b_t, scalar).unwrap();
    assert_eq!(out.he_level(), enc_b_t.he_level() - 3);

    let expected = mat_mat(&a, &b, scalar);
    assert_close(expected.data(), la.decrypt_matrix(&out).unwrap().data());
}

#[test]
fn transpose_and_concat() {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let backend = Arc::new(NaiveBackend::new(params.clone()));
    let eval = HomomorphicEval::new(backend, params.clone()).unwrap();
    let la = LinearAlgebra::new(&eval);
    let mut rng = ChaCha20Rng::seed_from_u64(5);

    let unit = la.make_unit(64).unwrap(); // 64x32
    let mat = random_matrix(&mut rng, 20, 45);
    let enc = la.encrypt_matrix(&mat, unit, None).unwrap();

    let t = la.transpose(&enc).unwrap();
    assert_eq!(t.height(), 45);
    assert_eq!(t.width(), 20);
    assert_eq!(t.encoding_unit(), unit.transposed());
    assert_eq!(t.cell(0, 0).encoding(), Encoding::ColMat);
    assert_close(
        mat.transposed().data(),
        la.decrypt_matrix(&t).unwrap().data(),
    );

    // transposing the view again recovers the original
    let tt = la.transpose(&t).unwrap();
    assert_close(mat.data(), la.decrypt_matrix(&tt).unwrap().data());

    // concatenation: all but the last matrix must fill their tiles
    let left = random_matrix(&mut rng, 20, 32);
    let right = random_matrix(&mut rng, 20, 7);
    let enc_left = la.encrypt_matrix(&left, unit, None).unwrap();
    let enc_right = la.encrypt_matrix(&right, unit, None).unwrap();
    let wide = la
        .horizontal_concat(&[enc_left.clone(), enc_right.clone()])
        .unwrap();
    assert_eq!(wide.width(), 39);
    let decrypted = la.decrypt_matrix(&wide).unwrap();
    for r in 0..20 {
        for c in 0..39 {
            let expected = if c < 32 {
                left.get(r, c)
            } else {
                right.get(r, c - 32)
            };
            assert!((decrypted.get(r, c) - expected).abs() < 1e-3);
        }
    }

    assert!(matches!(
        la.horizontal_concat(&[enc_right.clone(), enc_left.clone()]),
        Err(HeError::Shape { .. })
    ));

    let top = random_matrix(&mut rng, 64, 40);
    let bottom = random_matrix(&mut rng, 10, 40);
    let enc_top = la.encrypt_matrix(&top, unit, None).unwrap();
    let enc_bottom = la.encrypt_matrix(&bottom, unit, None).unwrap();
    let tall = la.vertical_concat(&[enc_top, enc_bottom]).unwrap();
    assert_eq!(tall.height(), 74);
    let decrypted = la.decrypt_matrix(&tall).unwrap();
    for c in 0..40 {
        assert!((decrypted.get(0, c) - top.get(0, c)).abs() < 1e-3);
        assert!((decrypted.get(70, c) - bottom.get(6, c)).abs() < 1e-3);
    }
}

#[test]
fn maintenance_operations() {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let backend = Arc::new(NaiveBackend::new(params.clone()));
    let eval = HomomorphicEval::new(backend, params.clone()).unwrap();
    let la = LinearAlgebra::new(&eval);
    let mut rng = ChaCha20Rng::seed_from_u64(13);

    let unit = la.make_unit(64).unwrap();
    let mat = random_matrix(&mut rng, 10, 10);
    let enc = la.encrypt_matrix(&mat, unit, None).unwrap();

    let mut low = la.reduce_level_to(&enc, 0).unwrap();
    assert_eq!(low.he_level(), 0);
    assert_eq!(low.scale(), enc.scale());

    let mut high = enc.clone();
    la.reduce_level_to_min_inplace(&mut high, &mut low).unwrap();
    assert_eq!(high.he_level(), 0);

    let prod = la.hadamard_square(&enc).unwrap();
    let rescaled = la.rescale_to_next(&la.relinearize(&prod).unwrap()).unwrap();
    assert_eq!(rescaled.he_level(), enc.he_level() - 1);
    assert_close(
        &mat.data().iter().map(|v| v * v).collect::<Vec<_>>(),
        la.decrypt_matrix(&rescaled).unwrap().data(),
    );
}

#[test]
fn shape_and_level_validation() {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let backend = Arc::new(NaiveBackend::new(params.clone()));
    let eval = HomomorphicEval::new(backend, params.clone()).unwrap();
    let la = LinearAlgebra::new(&eval);
    let mut rng = ChaCha20Rng::seed_from_u64(17);

    let unit = la.make_unit(64).unwrap();
    let other_unit = la.make_unit(32).unwrap();
    let mat = random_matrix(&mut rng, 10, 10);

    let on_unit = la.encrypt_matrix(&mat, unit, None).unwrap();
    let on_other = la.encrypt_matrix(&mat, other_unit, None).unwrap();
    assert!(matches!(
        la.add(&on_unit, &on_other),
        Err(HeError::Shape { .. })
    ));

    // matrix product wants staggered levels
    let enc_b_t = la.encrypt_matrix(&mat, unit, None).unwrap();
    assert!(matches!(
        la.multiply_matrix(&on_unit, &enc_b_t, 1.0),
        Err(HeError::LevelMismatch { .. })
    ));

    // mismatched inner dimensions
    let wide = la
        .encrypt_matrix(&random_matrix(&mut rng, 10, 12), unit, None)
        .unwrap();
    assert!(matches!(
        la.hadamard_multiply(&on_unit, &wide),
        Err(HeError::Shape { .. })
    ));

    let bad_height = la.make_unit(3);
    assert!(bad_height.is_err());
}
