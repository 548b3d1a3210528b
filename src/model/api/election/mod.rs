mod audit;
mod results;

pub use audit::AuditReport;
pub use results::{ElectionResults, OptionResult};
