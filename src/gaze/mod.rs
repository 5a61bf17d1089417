pub mod simulated;
pub mod source;

pub use hit_test::{BlankHitTester, ContentRegistry, ElementKey, HitTester, UiElement};
pub use simulated::SimulatedEngine;
pub use source::{AdapterStatus, GazeEngine, GazeFeed, GazeSourceAdapter};
