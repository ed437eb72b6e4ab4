use crate::domain::event::PaymentEvent;
use crate::error::{PaymentError, Result};
use std::io::Read;

/// Reads payment events from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<PaymentEvent>`.
/// It trims whitespace and accepts records that omit trailing columns.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    /// Creates a new `EventReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes events.
    pub fn events(self) -> impl Iterator<Item = Result<PaymentEvent>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::EventType;

    #[test]
    fn test_reader_valid_stream() {
        let data = "event, local_id, amount, message\n\
                    create, p-1, 1100,\n\
                    paid, p-1\n\
                    registration_failed, p-1, , timeout";
        let reader = EventReader::new(data.as_bytes());
        let results: Vec<Result<PaymentEvent>> = reader.events().collect();

        assert_eq!(results.len(), 3);
        let create = results[0].as_ref().unwrap();
        assert_eq!(create.event, EventType::Create);
        assert_eq!(create.amount, Some(1100));
        let paid = results[1].as_ref().unwrap();
        assert_eq!(paid.event, EventType::Paid);
        assert_eq!(paid.message, None);
        let failed = results[2].as_ref().unwrap();
        assert_eq!(failed.message.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "event, local_id, amount\nrefund, p-1, 10\npaid, p-1, not_a_number";
        let reader = EventReader::new(data.as_bytes());
        let results: Vec<Result<PaymentEvent>> = reader.events().collect();

        assert!(results[0].is_err());
        assert!(results[1].is_err());
    }
}
