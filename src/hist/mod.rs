//! Per-node gradient histograms: storage, CPU builder, device builder.

pub mod builder;
pub mod device;
pub mod store;

pub use builder::{BinIdx, HistBuilder};
pub use device::{
    AtomicAdd, DeviceHistBuilder, DeviceProperties, DeviceQueue, Event, HistDispatchConfig,
    HistDispatcher,
};
pub use store::{
    alloc_hist, copy_hist, init_hist, subtract_hist, sum_hist, HistRow, HistogramPool,
};
