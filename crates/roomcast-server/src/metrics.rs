//! Prometheus recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Returns the handle used to render `/metrics`. Fails if another recorder
/// is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render the Prometheus text exposition.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket upgrades accepted (counter).
pub const WS_UPGRADES_TOTAL: &str = "roomcast_ws_upgrades_total";
/// Sockets closed for missing the pong deadline (counter).
pub const WS_HEARTBEAT_TIMEOUTS_TOTAL: &str = "roomcast_ws_heartbeat_timeouts_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_from_unattached_recorder() {
        // No global install, so tests don't fight over the recorder.
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('\n'));
    }

    #[test]
    fn metric_names_share_prefix() {
        for name in [WS_UPGRADES_TOTAL, WS_HEARTBEAT_TIMEOUTS_TOTAL] {
            assert!(name.starts_with("roomcast_ws_"));
        }
    }
}
