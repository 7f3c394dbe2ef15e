//! Sandboxed execution and grading engine.
//!
//! Leaves first: [`sandbox`]/[`docker`] run one untrusted script,
//! [`gateway`]/[`remote`] validate and dispatch runs, [`harness`] builds
//! the per-case invocation script, [`comparator`] judges output and
//! [`grader`] ties them together.

pub mod comparator;
pub mod docker;
pub mod gateway;
pub mod grader;
pub mod harness;
pub mod remote;
pub mod sandbox;

pub use comparator::{canonical_text, compare, Comparison};
pub use docker::{DockerRunner, SANDBOX_LABEL};
pub use gateway::{ExecutionGateway, GatewayPolicy, LocalGateway};
pub use grader::{grade, GradeOptions};
pub use harness::{synthesize, HarnessedSource};
pub use remote::RemoteGateway;
pub use sandbox::{SandboxLimits, SandboxRunner};
