mod runreport;

pub use self::runreport::RunReport;
