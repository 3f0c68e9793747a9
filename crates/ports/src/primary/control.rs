use domain::accel::entity::AccelLimits;
use domain::common::entity::ProtoClass;

/// Primary port for the operational-control surface: stop/resume, the
/// retry-limit defaults, and read-only accelerated-connection counts.
pub trait ControlPort: Send + Sync {
    /// Stop processing new packets. In-flight accelerations complete
    /// or fail on their own.
    fn stop(&self);

    fn resume(&self);

    fn stopped(&self) -> bool;

    /// Fail all new-connection creation open (packets pass through
    /// unmanaged) ahead of shutdown.
    fn begin_terminate(&self);

    fn terminate_pending(&self) -> bool;

    /// Defaults applied to newly created connections; existing
    /// connections keep the limits they were created with.
    fn limits(&self) -> AccelLimits;

    fn set_limits(&self, limits: AccelLimits);

    fn accelerated(&self, class: ProtoClass) -> u64;

    fn accelerated_total(&self) -> u64;
}
