use crate::domain::payment::Payment;
use crate::domain::ports::Notifier;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;

#[derive(Serialize)]
struct ReportRow<'a> {
    report_source: &'a str,
    id: Option<u64>,
    local_identifier: &'a str,
    cat_username: &'a str,
    status: &'static str,
    amount: i64,
    currency: &'a str,
    paid: Option<DateTime<Utc>>,
    status_message: &'a str,
}

impl<'a> ReportRow<'a> {
    fn new(report_source: &'a str, payment: &'a Payment) -> Self {
        Self {
            report_source,
            id: payment.id(),
            local_identifier: payment.local_identifier(),
            cat_username: payment.cat_username(),
            status: payment.status().label(),
            amount: payment.amount(),
            currency: payment.currency(),
            paid: payment.paid(),
            status_message: payment.status_message(),
        }
    }
}

/// Writes unresolved-payment reports as CSV rows, one per payment.
///
/// Each row is prefixed with the source ILS the report was grouped under.
pub struct CsvReportNotifier<W: Write + Send> {
    writer: Mutex<csv::Writer<W>>,
}

impl<W: Write + Send> CsvReportNotifier<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: Mutex::new(csv::Writer::from_writer(sink)),
        }
    }
}

#[async_trait]
impl<W: Write + Send> Notifier for CsvReportNotifier<W> {
    async fn notify_unresolved(&self, source_ils: &str, payments: &[Payment]) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| PaymentError::NotificationError(e.to_string()))?;
        for payment in payments {
            writer
                .serialize(ReportRow::new(source_ils, payment))
                .map_err(|e| PaymentError::NotificationError(e.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::UserId;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_report_rows_carry_source() {
        let buffer = SharedBuffer::default();
        let notifier = CsvReportNotifier::new(buffer.clone());

        let mut first = Payment::new(UserId(1), "p-1");
        first.set_source_ils("North");
        let mut second = Payment::new(UserId(2), "p-2");
        second.set_source_ils("South");

        notifier.notify_unresolved("North", &[first]).await.unwrap();
        notifier.notify_unresolved("South", &[second]).await.unwrap();

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("report_source,id,local_identifier"));
        assert!(lines[1].starts_with("North,,p-1,"));
        assert!(lines[2].starts_with("South,,p-2,"));
    }
}
