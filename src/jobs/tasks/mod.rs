mod instance_report;

pub use instance_report::InstanceReportTask;
