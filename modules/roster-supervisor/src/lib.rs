pub mod checks;
pub mod classifier;
pub mod report;
pub mod supervisor;
pub mod types;

pub use classifier::PhotoClassifier;
pub use report::{save_report, AuditReport, Rollup};
pub use supervisor::Auditor;
pub use types::{AuditCategory, AuditFinding, AuditStats, PhotoCategory};
