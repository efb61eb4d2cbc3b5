pub mod candles;
mod harvester;

pub use harvester::*;
