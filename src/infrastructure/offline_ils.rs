use crate::domain::ports::{IlsGateway, RegistrationOutcome, RegistrationRequest};
use crate::error::Result;
use async_trait::async_trait;
use tracing::warn;

/// ILS gateway used when no ILS backend is connected.
///
/// Reports nothing payable and refuses every registration, so paid payments move
/// to `RegistrationFailed` and eventually expire into the staff report.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineIls;

pub const OFFLINE_REASON: &str = "no ILS backend configured";

#[async_trait]
impl IlsGateway for OfflineIls {
    async fn payable_amount(
        &self,
        _source_ils: &str,
        _cat_username: &str,
        _fine_ids: &[String],
    ) -> Result<Option<i64>> {
        Ok(None)
    }

    async fn register_payment(&self, request: RegistrationRequest) -> Result<RegistrationOutcome> {
        warn!(
            local_identifier = %request.local_identifier,
            source_ils = %request.source_ils,
            "Cannot register payment: {OFFLINE_REASON}"
        );
        Ok(RegistrationOutcome::Failed(OFFLINE_REASON.to_string()))
    }
}
