use bitio::{CompressionModel, InputStream, OutputStream, StreamMode};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Bit(bool),
    Bits { bits: u8, value: u32 },
    Align,
    Packed(u64),
    IntDelta { value: i64, baseline: i64 },
    Bytes(Vec<u8>),
}

fn mask_value(bits: u8, value: u32) -> u32 {
    if bits >= 32 {
        value
    } else if bits == 0 {
        0
    } else {
        value & ((1u32 << bits) - 1)
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(Op::Bit),
        (1u8..=32, any::<u32>()).prop_map(|(bits, value)| Op::Bits {
            bits,
            value: mask_value(bits, value),
        }),
        Just(Op::Align),
        any::<u64>().prop_map(Op::Packed),
        (-1_000_000_000i64..1_000_000_000, -1_000_000_000i64..1_000_000_000)
            .prop_map(|(value, baseline)| Op::IntDelta { value, baseline }),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Op::Bytes),
    ]
}

fn roundtrip_ops(mode: StreamMode, ops: &[Op]) {
    let model = CompressionModel::uniform(16);
    let mut out = OutputStream::new(mode, &model);
    for (i, op) in ops.iter().enumerate() {
        let ctx = (i % 16) as u16;
        match op {
            Op::Bit(b) => out.write_bool(*b),
            Op::Bits { bits, value } => out.write_raw_bits(*value, *bits).unwrap(),
            Op::Align => out.align(),
            Op::Packed(v) => out.write_packed_uint(ctx, *v).unwrap(),
            Op::IntDelta { value, baseline } => {
                out.write_packed_int_delta(ctx, *value, *baseline).unwrap();
            }
            Op::Bytes(data) => out.write_raw_bytes(data).unwrap(),
        }
    }
    let bytes = out.finish();

    let mut input = InputStream::new(mode, &model, &bytes);
    for (i, op) in ops.iter().enumerate() {
        let ctx = (i % 16) as u16;
        match op {
            Op::Bit(b) => assert_eq!(input.read_bool().unwrap(), *b),
            Op::Bits { bits, value } => {
                assert_eq!(input.read_raw_bits(*bits).unwrap(), *value);
            }
            Op::Align => input.align().unwrap(),
            Op::Packed(v) => assert_eq!(input.read_packed_uint(ctx).unwrap(), *v),
            Op::IntDelta { value, baseline } => {
                assert_eq!(input.read_packed_int_delta(ctx, *baseline).unwrap(), *value);
            }
            Op::Bytes(data) => {
                let mut buf = vec![0u8; data.len()];
                input.read_raw_bytes(&mut buf).unwrap();
                assert_eq!(&buf, data);
            }
        }
    }
}

proptest! {
    #[test]
    fn prop_roundtrip_raw(ops in prop::collection::vec(op_strategy(), 1..64)) {
        roundtrip_ops(StreamMode::Raw, &ops);
    }

    #[test]
    fn prop_roundtrip_huffman(ops in prop::collection::vec(op_strategy(), 1..64)) {
        roundtrip_ops(StreamMode::Huffman, &ops);
    }

    #[test]
    fn prop_packed_boundary_neighborhood(center in any::<u64>()) {
        for value in [center.saturating_sub(1), center, center.saturating_add(1)] {
            let model = CompressionModel::uniform(1);
            let mut out = OutputStream::new(StreamMode::Raw, &model);
            out.write_packed_uint(0, value).unwrap();
            let bytes = out.finish();
            let mut input = InputStream::new(StreamMode::Raw, &model, &bytes);
            prop_assert_eq!(input.read_packed_uint(0).unwrap(), value);
        }
    }
}
