use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stream_tdigest::tdigest::{DigestSnapshot, ScaleFamily, StorageVariant, TDigest};
use stream_tdigest::{ErrorKind, QuantileEstimator, TdError};
use tdigest_testdata::{gen_dataset, gen_weights, DistKind};

fn digest(variant: StorageVariant, compression: f64) -> TDigest {
    TDigest::new(compression, variant).expect("valid config")
}

fn exact_quantile(sorted: &[f64], q: f64) -> f64 {
    let t = (q * sorted.len() as f64 - 0.5).clamp(0.0, (sorted.len() - 1) as f64);
    let (lo, hi) = (t.floor() as usize, t.ceil() as usize);
    sorted[lo] + (t - lo as f64) * (sorted[hi] - sorted[lo])
}

#[test]
fn every_variant_supports_add_merge_quantile_cdf_median_and_persistence() {
    for variant in StorageVariant::ALL {
        let mut a = digest(variant, 128.0);
        a.add_many(&[0.0, 1.0, 2.0, 3.0]).expect("add base");
        a.add(4.0).expect("add scalar");
        a.add_weighted(5.0, 2.0).expect("add weighted");

        let mut b = digest(variant, 128.0);
        b.add_many(&[10.0, 11.0, 12.0, 13.0]).expect("add rhs");

        let mut merged_in_place = a.clone();
        merged_in_place.merge(&b);
        let mut merged_static = TDigest::merge_all(&[a.clone(), b.clone()]);

        assert_eq!(merged_in_place.total_weight(), 11.0);
        assert_eq!(b.total_weight(), 4.0, "other side untouched");
        assert_eq!(
            merged_in_place.quantile(0.5).unwrap(),
            merged_static.quantile(0.5).unwrap()
        );
        assert_eq!(
            merged_in_place.cdf(3.0).unwrap(),
            merged_static.cdf(3.0).unwrap()
        );
        assert_eq!(merged_in_place.min(), Some(0.0));
        assert_eq!(merged_in_place.max(), Some(13.0));

        let bytes = merged_in_place.to_bytes();
        let mut decoded = TDigest::from_bytes(&bytes).expect("decode");
        assert_eq!(decoded.variant(), variant);
        assert_eq!(decoded.median().unwrap(), merged_in_place.median().unwrap());

        let json = serde_json::to_string(&merged_in_place.snapshot()).unwrap();
        let snap: DigestSnapshot = serde_json::from_str(&json).unwrap();
        let mut restored = TDigest::from_snapshot(snap).expect("restore");
        for q in [0.0, 0.1, 0.5, 0.9, 1.0] {
            assert_eq!(
                restored.quantile(q).unwrap(),
                merged_in_place.quantile(q).unwrap(),
                "{variant} q={q}"
            );
        }
    }
}

#[test]
fn variants_give_identical_answers() {
    let data = gen_dataset(DistKind::Mixture, 30_000, 11);
    let weights = gen_weights(data.len(), 3, 11);
    let qs: Vec<f64> = (0..=200).map(|i| i as f64 / 200.0).collect();
    let probes: Vec<f64> = (0..=200).map(|i| -0.01 + 1.02 * i as f64 / 200.0).collect();

    let mut answers = Vec::new();
    for variant in StorageVariant::ALL {
        let mut td = digest(variant, 60.0);
        for (&x, &w) in data.iter().zip(&weights) {
            td.add_weighted(x, w).unwrap();
        }
        let centroids = td.centroids();
        answers.push((
            variant,
            centroids,
            td.quantiles(&qs).unwrap(),
            td.cdf_many(&probes).unwrap(),
        ));
    }
    let (_, c0, q0, p0) = &answers[0];
    for (variant, c, q, p) in &answers[1..] {
        assert_eq!(c, c0, "{variant}: centroids differ");
        assert_eq!(q, q0, "{variant}: quantiles differ");
        assert_eq!(p, p0, "{variant}: cdf differs");
    }
}

#[test]
fn quantiles_are_monotone_for_every_variant_and_scale() {
    let data = gen_dataset(DistKind::Exponential { lambda: 1.0 }, 20_000, 3);
    let qs: Vec<f64> = (0..=1000).map(|i| i as f64 / 1000.0).collect();
    for variant in StorageVariant::ALL {
        for scale in ScaleFamily::ALL {
            let mut td = TDigest::builder()
                .compression(25.0)
                .variant(variant)
                .scale(scale)
                .build()
                .unwrap();
            td.add_many(&data).unwrap();
            let vals = td.quantiles(&qs).unwrap();
            for w in vals.windows(2) {
                assert!(w[0] <= w[1], "{variant}/{scale}: {} > {}", w[0], w[1]);
            }
            let cdf = td.cdf_many(&vals).unwrap();
            for w in cdf.windows(2) {
                assert!(w[0] <= w[1], "{variant}/{scale}: cdf not monotone");
            }
        }
    }
}

#[test]
fn normalized_fractional_weights_keep_quantile_properties() {
    let data = gen_dataset(DistKind::Normal, 20_000, 31);
    let raw = gen_weights(data.len(), 3, 31);
    let total: f64 = raw.iter().sum();
    let qs: Vec<f64> = (0..=1000).map(|i| i as f64 / 1000.0).collect();

    for variant in StorageVariant::ALL {
        let mut td = digest(variant, 100.0);
        for (&x, &w) in data.iter().zip(&raw) {
            td.add_weighted(x, w / total).unwrap();
        }
        assert!((td.total_weight() - 1.0).abs() <= 1e-9);

        let vals = td.quantiles(&qs).unwrap();
        for w in vals.windows(2) {
            assert!(w[0] <= w[1], "{variant}: {} > {}", w[0], w[1]);
        }
        assert_eq!(vals[0], td.min().unwrap(), "{variant}");
        assert_eq!(vals[1000], td.max().unwrap(), "{variant}");

        for i in 1..100 {
            let q = i as f64 / 100.0;
            let x = td.quantile(q).unwrap();
            let back = td.cdf(x).unwrap();
            assert!((back - q).abs() <= 0.01, "{variant}: cdf(quantile({q})) = {back}");
        }
    }
}

#[test]
fn single_centroid_covers_the_observed_range() {
    let data: Vec<f64> = (0..1000).map(f64::from).collect();
    for variant in StorageVariant::ALL {
        let mut td = digest(variant, 0.5);
        td.add_many(&data).unwrap();
        td.compress();
        assert_eq!(td.centroid_count(), 1, "{variant}");

        assert_eq!(td.quantile(0.0).unwrap(), 0.0);
        assert_eq!(td.quantile(1.0).unwrap(), 999.0);
        for i in 1..20 {
            let q = i as f64 / 20.0;
            let x = td.quantile(q).unwrap();
            let back = td.cdf(x).unwrap();
            assert!((back - q).abs() <= 1e-9, "{variant}: cdf(quantile({q})) = {back}");
        }
    }
}

#[test]
fn total_weight_is_conserved_exactly() {
    let mut rng = StdRng::seed_from_u64(5);
    for variant in StorageVariant::ALL {
        let mut td = digest(variant, 30.0);
        let mut expected = 0.0;
        for i in 0..25_000 {
            let w = rng.random_range(1..=5) as f64;
            td.add_weighted(rng.random::<f64>() * 100.0, w).unwrap();
            expected += w;
            if i % 4_999 == 0 {
                // Buffered or not, the weight is accounted.
                assert_eq!(td.total_weight(), expected);
            }
        }
        td.compress();
        assert_eq!(td.total_weight(), expected);
        let centroid_sum: f64 = td.centroids().iter().map(|c| c.weight()).sum();
        assert_eq!(centroid_sum, expected, "{variant}");
    }
}

#[test]
fn centroid_count_stays_bounded_by_compression() {
    for variant in StorageVariant::ALL {
        for compression in [20.0, 100.0, 300.0] {
            let mut td = digest(variant, compression);
            td.add_many(&gen_dataset(DistKind::Normal, 100_000, 17)).unwrap();
            td.compress();
            let n = td.centroid_count();
            assert!(
                n as f64 <= 6.0 * compression,
                "{variant} δ={compression}: {n} centroids"
            );
            assert_eq!(td.buffered_len(), 0);
        }
    }
}

#[test]
fn cdf_inverts_quantile_inside_the_unit_interval() {
    let data = gen_dataset(DistKind::Normal, 10_000, 21);
    for variant in StorageVariant::ALL {
        let mut td = digest(variant, 100.0);
        td.add_many(&data).unwrap();
        for i in 1..99 {
            let q = i as f64 / 100.0;
            let x = td.quantile(q).unwrap();
            let back = td.cdf(x).unwrap();
            assert!((back - q).abs() <= 0.01, "{variant}: cdf(quantile({q})) = {back}");
        }
    }
}

#[test]
fn million_uniform_samples_meet_tail_accuracy() {
    let mut rng = StdRng::seed_from_u64(2024);
    let data: Vec<f64> = (0..1_000_000).map(|_| rng.random::<f64>()).collect();
    let mut sorted = data.clone();
    sorted.sort_by(f64::total_cmp);
    let true_p99 = exact_quantile(&sorted, 0.99);
    let true_p50 = exact_quantile(&sorted, 0.5);

    for variant in StorageVariant::ALL {
        let mut td = digest(variant, 100.0);
        for &x in &data {
            td.add(x).unwrap();
        }
        let p99 = td.quantile(0.99).unwrap();
        let p50 = td.quantile(0.5).unwrap();
        assert!((p99 - true_p99).abs() <= 0.01, "{variant}: p99 = {p99}");
        assert!((p50 - true_p50).abs() <= 0.02, "{variant}: p50 = {p50}");
    }
}

#[test]
fn merged_shards_track_a_single_digest() {
    let data = gen_dataset(DistKind::Uniform, 80_000, 99);
    for variant in StorageVariant::ALL {
        let mut whole = digest(variant, 100.0);
        whole.add_many(&data).unwrap();

        let shards: Vec<TDigest> = data
            .chunks(20_000)
            .map(|chunk| {
                let mut td = digest(variant, 100.0);
                td.add_many(chunk).unwrap();
                td
            })
            .collect();
        let mut pairwise = shards[0].clone();
        for s in &shards[1..] {
            pairwise.merge(s);
        }
        let mut kway = TDigest::merge_all(&shards);

        assert_eq!(pairwise.total_weight(), whole.total_weight());
        assert_eq!(kway.total_weight(), whole.total_weight());
        for i in 1..100 {
            let q = i as f64 / 100.0;
            let expected = whole.quantile(q).unwrap();
            let a = pairwise.quantile(q).unwrap();
            let b = kway.quantile(q).unwrap();
            assert!((a - expected).abs() <= 0.01, "{variant} pairwise q={q}: {a} vs {expected}");
            assert!((b - expected).abs() <= 0.01, "{variant} k-way q={q}: {b} vs {expected}");
        }
    }
}

#[test]
fn empty_digest_queries_fail_deterministically() {
    for variant in StorageVariant::ALL {
        let mut td = digest(variant, 100.0);
        for _ in 0..2 {
            assert_eq!(td.quantile(0.5), Err(TdError::EmptyDigest));
            assert_eq!(td.cdf(0.0), Err(TdError::EmptyDigest));
            assert_eq!(td.median(), Err(TdError::EmptyDigest));
        }
        assert_eq!(td.min(), None);
        assert_eq!(td.mean(), None);
        assert_eq!(TdError::EmptyDigest.kind(), ErrorKind::Domain);
    }
}

#[test]
fn invalid_input_is_rejected_without_side_effects() {
    for variant in StorageVariant::ALL {
        let mut td = digest(variant, 50.0);
        td.add_many(&gen_dataset(DistKind::Uniform, 1_234, 1)).unwrap();
        td.compress();
        td.add(0.5).unwrap();
        let before = (td.total_weight(), td.centroid_count(), td.buffered_len(), td.sum());

        let errors = [
            td.add(f64::NAN).unwrap_err(),
            td.add(f64::INFINITY).unwrap_err(),
            td.add_weighted(1.0, -1.0).unwrap_err(),
            td.add_weighted(1.0, 0.0).unwrap_err(),
            td.add_many(&[0.1, 0.2, f64::NEG_INFINITY]).unwrap_err(),
        ];
        for e in &errors {
            assert_eq!(e.kind(), ErrorKind::Domain, "{e}");
        }
        let after = (td.total_weight(), td.centroid_count(), td.buffered_len(), td.sum());
        assert_eq!(before, after, "{variant}");

        // A rejected query must not flush either.
        assert!(matches!(
            td.quantile(1.5),
            Err(TdError::QuantileOutOfRange { .. })
        ));
        assert_eq!(td.buffered_len(), before.2);
    }
}

#[test]
fn construction_rejects_bad_configuration() {
    for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let err = TDigest::new(bad, StorageVariant::Default).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
    let err = "skiplist".parse::<StorageVariant>().unwrap_err();
    assert!(matches!(err, TdError::UnknownVariant { .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!("AVL".parse::<StorageVariant>().unwrap(), StorageVariant::AvlTree);
}

#[test]
fn estimator_follows_a_stream() {
    let data = gen_dataset(DistKind::Uniform, 50_000, 8);
    let mut sorted = data.clone();
    sorted.sort_by(f64::total_cmp);

    let mut est = QuantileEstimator::new(0.95, StorageVariant::Array, 100.0).unwrap();
    for chunk in data.chunks(1_000) {
        est.collect_many(chunk).unwrap();
    }
    assert_eq!(est.count(), data.len());
    let got = est.estimate().unwrap();
    assert!((got - exact_quantile(&sorted, 0.95)).abs() <= 0.01, "p95 = {got}");
}
