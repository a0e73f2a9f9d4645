pub mod actor;
pub mod audit;
pub mod overrides;
pub mod project;
pub mod quota;
pub mod suspension;

pub use actor::{Actor, Role};
pub use audit::{AuditEvent, LogType, Severity};
pub use overrides::{ManualOverride, OverrideAction};
pub use project::{DataAccess, ProjectStatus};
pub use quota::{calculate_status, CapType, ProjectCap, QuotaStatus, UsageSample};
pub use suspension::{SuspensionReason, SuspensionRecord};
