use metrics_exporter_prometheus::PrometheusHandle;
use prospect_ai::config::OutreachConfig;
use prospect_ai::workflows::outreach::{
    EmailError, EmailSender, InMemoryCompanyRepository, InMemoryLetterRepository, OutboundEmail,
    OutreachService,
};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

pub(crate) type ApiService =
    OutreachService<InMemoryCompanyRepository, InMemoryLetterRepository, LoggingEmailSender>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Delivery stub: records and logs outbound letters instead of talking to a mail relay.
#[derive(Default, Clone)]
pub(crate) struct LoggingEmailSender {
    delivered: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl EmailSender for LoggingEmailSender {
    fn send(&self, email: &OutboundEmail) -> Result<(), EmailError> {
        let mut guard = self
            .delivered
            .lock()
            .map_err(|_| EmailError::Transport("outbox lock poisoned".to_string()))?;
        info!(
            company_id = %email.company_id,
            letter_id = %email.letter_id,
            to = %email.to,
            subject = %email.subject,
            "letter handed to delivery stub"
        );
        guard.push(email.clone());
        Ok(())
    }
}

impl LoggingEmailSender {
    pub(crate) fn delivered(&self) -> Vec<OutboundEmail> {
        self.delivered
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

pub(crate) fn build_service(config: OutreachConfig) -> (Arc<ApiService>, LoggingEmailSender) {
    let sender = LoggingEmailSender::default();
    let service = OutreachService::new(
        Arc::new(InMemoryCompanyRepository::default()),
        Arc::new(InMemoryLetterRepository::default()),
        Arc::new(sender.clone()),
        config,
    );
    (Arc::new(service), sender)
}
