pub mod event_reader;
pub mod payment_writer;
pub mod report_notifier;
