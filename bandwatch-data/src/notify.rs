use crate::{event::UpdateEvent, metric::engine::Alert};
use tracing::{debug, info};

/// Side effect invoked by the update consumer for every event and alert.
pub trait Notifier: Send + Sync {
    fn on_event(&self, event: &UpdateEvent);

    fn on_alert(&self, alert: &Alert);
}

/// Writes alerts as `info` log lines and events at `debug`.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn on_event(&self, event: &UpdateEvent) {
        debug!(%event, "update");
    }

    fn on_alert(&self, alert: &Alert) {
        info!(
            market = %alert.market,
            direction = %alert.direction,
            close = %alert.close,
            "{alert}"
        );
    }
}
