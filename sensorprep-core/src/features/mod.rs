//! Sliding windows and per-window statistical features.

pub mod compute;
pub mod stats;
pub mod window;

pub use compute::{FeatureComputer, FeatureTable, FeatureVector};
pub use stats::{ChannelStats, Moments};
pub use window::{Window, WindowExtractor, Windows};
