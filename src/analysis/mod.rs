pub mod angle;
pub mod fault;
pub mod feedback;
pub mod metrics;
pub mod phase;
pub mod session;
pub mod smooth;

pub use angle::{angle3d, JointAngles};
pub use fault::{FaultHit, FaultKind, FaultTally};
pub use feedback::Feedback;
pub use metrics::{Explosiveness, JumpRecord, PerformanceTier, QualitativeBand, SessionAccumulator};
pub use phase::{JumpPhase, JumpType, PhaseMachine};
pub use session::{AnalysisSession, FrameAnalysis, FrameDetails};
pub use smooth::{AngleSmoother, RollingMean};
