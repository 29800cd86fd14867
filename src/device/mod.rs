pub mod classifier;

pub use classifier::{classify, DeviceProfile, EnvironmentSignals};
