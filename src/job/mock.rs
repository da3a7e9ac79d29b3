//! Recording notifier for tests.

use std::sync::{Arc, Mutex};

use crate::job::error::NotifyError;
use crate::job::notifier::Notifier;
use crate::job::request::ClientId;
use crate::transform::Rgb;

#[derive(Clone, Default)]
pub struct MockNotifier {
    pub sent: Arc<Mutex<Vec<(ClientId, Vec<Rgb>)>>>,
    pub fail_with: Option<u16>,
}

impl MockNotifier {
    pub fn sent(&self) -> Vec<(ClientId, Vec<Rgb>)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for MockNotifier {
    fn notify_colors(&self, client_id: &ClientId, colors: &[Rgb]) -> Result<(), NotifyError> {
        if let Some(status) = self.fail_with {
            return Err(NotifyError::Status {
                uri: "mock".to_string(),
                status,
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((client_id.clone(), colors.to_vec()));
        Ok(())
    }
}
