/*!
# hwmon DevKit - Fakes and helpers for testing the monitoring engine

Library for exercising the engine without hardware or privileges:
- Scripted sensor provider replaying one frame of devices per refresh
- Recording display and alert sink for assertions
- Test harness wiring a full `PollScheduler` around them
*/

pub mod fake_provider;
pub mod recorders;
pub mod test_utils;

pub use fake_provider::{FakeDevice, ProviderProbe, ScriptedProvider};
pub use recorders::{RecordingAlertSink, RecordingDisplay};
pub use test_utils::{init_test_logging, TestHarness};
