use bitio::{CompressionModel, InputStream, OutputStream, StreamMode};
use codec::{
    predict, read_delta, write_delta, Baseline, BaselineWindow, ChangeBitmap, SnapshotHash,
    MASK_NOT_PREDICTING,
};
use schema::{FieldDescriptor, FieldKind, Schema};

fn mover_schema() -> Schema {
    Schema::new(
        0,
        vec![
            FieldDescriptor::new("health", FieldKind::UInt).with_bits(16).with_delta(),
            FieldDescriptor::new("pos", FieldKind::Vector3)
                .with_precision(2)
                .with_delta(),
        ],
    )
    .unwrap()
    .with_context_base(1)
}

/// Entity state at `tick`: constant health, x moving 150 units per tick.
fn state_at(schema: &Schema, tick: u64) -> Vec<u32> {
    let mut buffer = vec![0u32; schema.word_count()];
    buffer[0] = 100;
    buffer[1] = (tick * 150) as u32;
    buffer
}

#[test]
fn linear_motion_costs_almost_nothing() {
    let schema = mover_schema();
    let model = CompressionModel::uniform(8);

    // Both peers hold baselines for ticks 1..=3 and agree on them.
    let mut window = BaselineWindow::new(4, schema.word_count());
    for tick in 1..=3u64 {
        window.insert(tick, &state_at(&schema, tick));
    }
    let baselines: Vec<Baseline<'_>> = window
        .ticks()
        .map(|tick| Baseline::new(tick, window.get(tick).unwrap()))
        .collect();

    let current = state_at(&schema, 4);
    let newest = window.get(3).unwrap().to_vec();

    let mut predicted = vec![0u32; schema.word_count()];
    let predicted_changed = predict(&schema, &baselines, 4, &mut predicted).unwrap();
    assert!(predicted_changed.get(1), "motion should be predicted");

    let mut out = OutputStream::new(StreamMode::Raw, &model);
    let mut write_hash = SnapshotHash::new();
    write_delta(
        &schema,
        &current,
        &newest,
        &predicted,
        &predicted_changed,
        MASK_NOT_PREDICTING,
        &mut out,
        &mut write_hash,
    )
    .unwrap();
    // Bitmap chunk plus three exact-prediction zero deltas: 8 bits total.
    assert_eq!(out.bits_written(), 8);
    let bytes = out.finish();

    // Receiver side runs the identical prediction and reconstructs exactly.
    let mut rx_predicted = vec![0u32; schema.word_count()];
    let rx_changed = predict(&schema, &baselines, 4, &mut rx_predicted).unwrap();
    assert_eq!(rx_predicted, predicted);
    assert_eq!(rx_changed, predicted_changed);

    let mut input = InputStream::new(StreamMode::Raw, &model, &bytes);
    let mut decoded = vec![0u32; schema.word_count()];
    let mut read_hash = SnapshotHash::new();
    read_delta(
        &schema,
        &newest,
        &rx_predicted,
        &rx_changed,
        MASK_NOT_PREDICTING,
        &mut input,
        &mut decoded,
        &mut read_hash,
    )
    .unwrap();
    assert_eq!(decoded, current);
    assert_eq!(write_hash.value(), read_hash.value());
}

#[test]
fn misprediction_still_reconstructs_exactly() {
    let schema = mover_schema();
    let model = CompressionModel::uniform(8);

    let tick2 = state_at(&schema, 2);
    let tick3 = state_at(&schema, 3);
    let baselines = [Baseline::new(3, &tick3), Baseline::new(2, &tick2)];

    // The entity stops dead; prediction keeps it moving.
    let current = state_at(&schema, 3);

    let mut predicted = vec![0u32; schema.word_count()];
    let predicted_changed = predict(&schema, &baselines, 4, &mut predicted).unwrap();

    let mut out = OutputStream::new(StreamMode::Raw, &model);
    let mut write_hash = SnapshotHash::new();
    write_delta(
        &schema,
        &current,
        &tick3,
        &predicted,
        &predicted_changed,
        MASK_NOT_PREDICTING,
        &mut out,
        &mut write_hash,
    )
    .unwrap();
    let bytes = out.finish();

    let mut input = InputStream::new(StreamMode::Raw, &model, &bytes);
    let mut decoded = vec![0u32; schema.word_count()];
    let mut read_hash = SnapshotHash::new();
    read_delta(
        &schema,
        &tick3,
        &predicted,
        &predicted_changed,
        MASK_NOT_PREDICTING,
        &mut input,
        &mut decoded,
        &mut read_hash,
    )
    .unwrap();
    assert_eq!(decoded, current);
    assert_eq!(write_hash.value(), read_hash.value());
}

#[test]
fn huffman_mode_matches_raw_reconstruction() {
    let schema = mover_schema();
    let model = CompressionModel::uniform(8);
    let baseline = state_at(&schema, 1);
    let current = state_at(&schema, 5);
    let empty = ChangeBitmap::new();

    for mode in [StreamMode::Raw, StreamMode::Huffman] {
        let mut out = OutputStream::new(mode, &model);
        let mut write_hash = SnapshotHash::new();
        write_delta(
            &schema,
            &current,
            &baseline,
            &baseline,
            &empty,
            MASK_NOT_PREDICTING,
            &mut out,
            &mut write_hash,
        )
        .unwrap();
        let bytes = out.finish();

        let mut input = InputStream::new(mode, &model, &bytes);
        let mut decoded = vec![0u32; schema.word_count()];
        let mut read_hash = SnapshotHash::new();
        read_delta(
            &schema,
            &baseline,
            &baseline,
            &empty,
            MASK_NOT_PREDICTING,
            &mut input,
            &mut decoded,
            &mut read_hash,
        )
        .unwrap();
        assert_eq!(decoded, current, "mode {mode:?}");
        assert_eq!(write_hash.value(), read_hash.value());
    }
}
