// SPDX-License-Identifier: MIT
//
// Keysearch: Constrained Keystream Key Recovery
// Copyright (c) 2025 Keysearch Contributors

use keysearch_core::{
    EngineSettings, Estimator, JobConfig, KeyConstraints, KeystreamCipher, Rc4, SearchEngine,
    SearchJob, SearchOutcome, StopPolicy,
};
use std::sync::Arc;

const PLAINTEXT: &[u8] = b"Key:wow_th4t_w4s_impr3ssive.Kudos!";
const TRUE_KEY: &str = "6230302141364a785e4073";

/// Sample job with the free ranges narrowed around the true key (47 952 keys)
fn narrowed_job() -> JobConfig {
    let mut job = JobConfig::sample();
    job.key.min = vec![0, 0, 0, 0, 11, 12, 9, 5, 0, 0, 0];
    job.key.max = vec![0, 0, 0, 0, 12, 14, 11, 6, 2, 2, 147];
    job
}

fn settings(workers: usize, batch_size: usize, stop_policy: StopPolicy) -> EngineSettings {
    EngineSettings {
        workers,
        batch_size,
        queue_depth: 2,
        stop_policy,
        progress_interval_ms: 100,
    }
}

fn run(job: JobConfig, settings: EngineSettings) -> keysearch_core::SearchReport {
    let cipher = Arc::new(job.cipher());
    SearchEngine::new(cipher, job.into_job().unwrap(), settings)
        .unwrap()
        .run()
        .unwrap()
}

#[test]
fn recovers_sample_key_with_any_pool_size() {
    for workers in [1, 2, 16] {
        let report = run(narrowed_job(), settings(workers, 1000, StopPolicy::First));

        assert_eq!(report.outcome, SearchOutcome::Found, "workers={}", workers);
        assert_eq!(report.key_space_size, 47_952);
        let found = report.first_match().unwrap();
        assert_eq!(found.plaintext, PLAINTEXT);
        assert_eq!(hex::encode(&found.key), TRUE_KEY);
        assert_eq!(found.raw, vec![0x62, 0x30, 0x30, 0x21, 12, 13, 10, 5, 1, 1, 8]);
    }
}

#[test]
fn scan_all_reports_single_match_at_its_index() {
    let report = run(narrowed_job(), settings(4, 777, StopPolicy::All));

    assert_eq!(report.outcome, SearchOutcome::Found);
    assert_eq!(report.keys_tested, 47_952);
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].index, 35_232);
    assert_eq!(hex::encode(&report.matches[0].key), TRUE_KEY);
}

#[test]
fn exhausts_space_without_match() {
    let mut job = narrowed_job();
    // Exclude the true value of the last byte
    job.key.min[10] = 9;

    let report = run(job, settings(3, 500, StopPolicy::First));

    assert_eq!(report.outcome, SearchOutcome::Exhausted);
    assert!(report.matches.is_empty());
    assert_eq!(u128::from(report.keys_tested), report.key_space_size);
}

#[test]
fn fully_known_key_is_a_single_candidate() {
    let mut job = JobConfig::sample();
    let key = hex::decode(TRUE_KEY).unwrap();
    // Fixed bytes get offsets too, so store the pre-offset values
    job.key.known = key
        .iter()
        .zip(&job.key.offset)
        .map(|(k, o)| k.wrapping_sub(*o))
        .collect();
    job.key.is_known = vec![true; 11];

    let report = run(job, settings(2, 64, StopPolicy::First));
    assert_eq!(report.outcome, SearchOutcome::Found);
    assert_eq!(report.key_space_size, 1);
    assert_eq!(report.first_match().unwrap().plaintext, PLAINTEXT);
}

#[test]
fn cancelled_search_reports_cancelled() {
    let job = narrowed_job();
    let cipher = Arc::new(job.cipher());
    let engine = SearchEngine::new(
        cipher,
        job.into_job().unwrap(),
        settings(2, 10, StopPolicy::All),
    )
    .unwrap();

    engine.cancel_token().cancel();
    let report = engine.run().unwrap();

    assert_eq!(report.outcome, SearchOutcome::Cancelled);
    assert!(report.matches.is_empty());
    assert!(report.keys_tested < 47_952);
}

#[test]
fn cancel_from_another_thread_stops_large_search() {
    let rc4 = Rc4::new();
    let ciphertext = rc4.encrypt(b"no such key", b"Attack at dawn");
    let job = SearchJob::new(
        ciphertext,
        b"Attack".to_vec(),
        KeyConstraints::all_free(5).unwrap(),
    )
    .unwrap();

    let engine = SearchEngine::new(Arc::new(rc4), job, settings(2, 256, StopPolicy::First)).unwrap();
    let cancel = engine.cancel_token();
    let metrics = engine.metrics();
    let handle = std::thread::spawn(move || engine.run().unwrap());

    while metrics.keys_tested() == 0 {
        std::thread::yield_now();
    }
    cancel.cancel();

    let report = handle.join().unwrap();
    assert_eq!(report.outcome, SearchOutcome::Cancelled);
    assert!(u128::from(report.keys_tested) < report.key_space_size);
}

#[test]
fn estimator_counts_exact_key_space() {
    let job = JobConfig::sample();
    let cipher = Arc::new(job.cipher());
    let estimator = Estimator::new(cipher, settings(2, 4096, StopPolicy::First))
        .with_calibration_bytes(1)
        .unwrap();

    let estimate = estimator.estimate(&job.into_job().unwrap()).unwrap();

    assert_eq!(estimate.key_space_size, 12 * 31 * 24 * 8 * 5 * 3 * 148);
    assert_eq!(estimate.calibration.key_bytes, 1);
    assert_eq!(estimate.calibration.keys, 256);
    assert!(estimate.projected_secs() >= 0.0);
}

#[test]
fn rejects_pattern_longer_than_payload() {
    let mut job = narrowed_job();
    job.pattern = Some(String::from_utf8(PLAINTEXT.to_vec()).unwrap() + "!");
    let cipher = Arc::new(job.cipher());
    assert_eq!(cipher.plaintext_len(35), 34);

    let err = SearchEngine::new(cipher, job.into_job().unwrap(), EngineSettings::default())
        .err()
        .unwrap();
    assert!(err.is_config_error());
}

#[test]
#[ignore = "scans up to 158 561 280 keys; run with --ignored --release"]
fn recovers_sample_key_from_full_space() {
    let report = run(JobConfig::sample(), EngineSettings::default());

    assert_eq!(report.outcome, SearchOutcome::Found);
    let found = report.first_match().unwrap();
    assert!(found.plaintext.starts_with(b"Key:"));
    assert_eq!(found.plaintext, PLAINTEXT);
}
