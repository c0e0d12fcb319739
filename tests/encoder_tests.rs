use foresight::context::ContextSnapshot;
use foresight::encoder::FeatureEncoder;
use foresight::kernel::config::EncoderConfig;
use foresight::kernel::error::EncodingError;
use proptest::prelude::*;
use uuid::Uuid;

fn encoder() -> FeatureEncoder {
    FeatureEncoder::new(EncoderConfig::default())
}

fn snap(ts: i64, title: &str, class: &str, files: &[&str]) -> ContextSnapshot {
    ContextSnapshot::builder(ts)
        .title(title)
        .class(class)
        .process(class.to_lowercase(), 42)
        .files(files.iter().copied())
        .elapsed(5_000)
        .build()
}

#[test]
fn test_vector_has_fixed_dimension() {
    let enc = encoder();
    let short = vec![snap(1_000, "main.rs - Code", "Code", &["/p/main.rs"])];
    let long: Vec<_> = (0..30)
        .map(|i| snap(1_000 + i * 1_000, "x", "App", &[]))
        .collect();

    assert_eq!(enc.encode(&short).unwrap().dim(), enc.dim());
    assert_eq!(enc.encode(&long).unwrap().dim(), enc.dim());
}

#[test]
fn test_ids_do_not_affect_encoding() {
    // Equal content, different snapshot ids: identical vectors.
    let a = snap(10_000, "notes.md - Obsidian", "Obsidian", &["/n/notes.md"]);
    let mut b = a.clone();
    b.id = Uuid::new_v4();
    let enc = encoder();
    assert_eq!(enc.encode(&[a]).unwrap(), enc.encode(&[b]).unwrap());
}

#[test]
fn test_only_last_k_snapshots_matter() {
    let enc = encoder();
    let k = enc.history_window();
    let tail: Vec<_> = (0..=k as i64)
        .map(|i| snap(100_000 + i * 1_000, "t", "Code", &[]))
        .collect();

    let mut with_old = vec![snap(1, "ancient", "Firefox", &["/old.pdf"])];
    with_old.extend(tail.iter().cloned());

    assert_eq!(enc.encode(&tail).unwrap(), enc.encode(&with_old).unwrap());
}

#[test]
fn test_unseen_names_never_fail() {
    let enc = encoder();
    let weird = snap(5, "😀 ☃ — ∑", "", &["/no/extension", "/x/y.ZZZ"]);
    assert!(enc.encode(&[weird]).is_ok());
}

#[test]
fn test_malformed_history_is_rejected() {
    let enc = encoder();
    assert_eq!(enc.encode(&[]), Err(EncodingError::EmptyHistory));

    let negative = snap(-1, "a", "b", &[]);
    assert_eq!(enc.encode(&[negative]), Err(EncodingError::NegativeTimestamp(-1)));

    let backwards = vec![snap(2_000, "a", "A", &[]), snap(1_000, "b", "B", &[])];
    assert_eq!(
        enc.encode(&backwards),
        Err(EncodingError::OutOfOrder {
            earlier: 2_000,
            later: 1_000
        })
    );

    let mut bad_gap = snap(1_000, "a", "A", &[]);
    bad_gap.elapsed_ms = -5;
    assert_eq!(enc.encode(&[bad_gap]), Err(EncodingError::NegativeElapsed(-5)));
}

#[test]
fn test_app_switch_changes_the_vector() {
    let enc = encoder();
    let stay = vec![snap(1_000, "a", "Code", &[]), snap(2_000, "a", "Code", &[])];
    let switch = vec![snap(1_000, "a", "Firefox", &[]), snap(2_000, "a", "Code", &[])];
    assert_ne!(enc.encode(&stay).unwrap(), enc.encode(&switch).unwrap());
}

fn arb_snapshot() -> impl Strategy<Value = (i64, String, String, Vec<String>, i64)> {
    (
        0i64..10_000_000,
        "[a-zA-Z .\\-]{0,24}",
        "[a-zA-Z]{0,10}",
        prop::collection::vec("/[a-z]{1,6}\\.[a-z]{1,3}", 0..10),
        0i64..100_000,
    )
}

proptest! {
    #[test]
    fn prop_encoding_is_deterministic(raw in prop::collection::vec(arb_snapshot(), 1..14)) {
        let mut ts = 0i64;
        let history: Vec<ContextSnapshot> = raw
            .into_iter()
            .map(|(gap, title, class, files, elapsed)| {
                ts += gap;
                ContextSnapshot::builder(ts)
                    .title(title)
                    .class(class)
                    .files(files)
                    .elapsed(elapsed)
                    .build()
            })
            .collect();

        let enc = encoder();
        let first = enc.encode(&history).unwrap();
        let second = enc.encode(&history.clone()).unwrap();

        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        prop_assert_eq!(bits(first.as_slice()), bits(second.as_slice()));
        prop_assert_eq!(first.digest(), second.digest());
        prop_assert!(first.as_slice().iter().all(|x| x.is_finite()));
    }
}
