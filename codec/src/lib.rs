//! Delta and prediction codec for repnet entity snapshots.
//!
//! Given a schema, a current value buffer, and acknowledged baselines, this
//! crate encodes only what the receiver cannot already derive: a change
//! bitmap XORed against the predictor's guess, then per-field deltas against
//! the predicted values. [`predict`] runs the same multi-baseline linear
//! extrapolation on both peers, so the prediction itself never crosses the
//! wire.
//!
//! # Design Principles
//!
//! - **Symmetry** - Encoder and decoder consume identical baseline and
//!   prediction inputs; any divergence is a protocol violation surfaced by
//!   the running [`SnapshotHash`].
//! - **Bounded state** - Baseline history lives in fixed-capacity
//!   [`BaselineWindow`]s with storage recycling.
//! - **No transport knowledge** - Sequencing, acks, and packaging live a
//!   layer up.

mod baseline;
mod delta;
mod error;
mod predict;
mod types;

pub use baseline::BaselineWindow;
pub use delta::{read_delta, write_delta, MASK_NOT_PREDICTING, MASK_PREDICTING};
pub use error::{CodecError, CodecResult};
pub use predict::{predict, Baseline, MAX_BASELINES};
pub use types::{ChangeBitmap, SnapshotHash};
