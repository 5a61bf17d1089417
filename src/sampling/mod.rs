pub mod clock;
pub mod controller;
pub mod loop_worker;

pub use clock::SessionClock;
pub use controller::{tick_period, SamplerController, MIN_TICK_PERIOD_MS};
pub use loop_worker::{SampleBuffer, SampleSources, SamplingJob};
