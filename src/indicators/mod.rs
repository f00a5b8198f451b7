// Technical indicators module
// Series-valued primitives plus the WaveTrend oscillator and divergence scan

pub mod divergence;
pub mod mfi;
pub mod moving_average;
pub mod rsi;
pub mod wavetrend;

pub use divergence::{find_divergences, Divergences};
pub use mfi::mfi_series;
pub use moving_average::{ema_series, sma_series};
pub use rsi::rsi_series;
pub use wavetrend::{wavetrend, WaveTrend};
