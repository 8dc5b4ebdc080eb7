use crate::error::EngineError;
use crate::host::{DocumentHost, HostToggles};

/// Run a document-modifying action with the host's smart-editing toggles
/// suspended, restoring the captured values on every exit path.
///
/// A failure propagates unchanged after restoration; there are no retries.
pub fn run_guarded<H: DocumentHost, T>(
    host: &mut H,
    action: impl FnOnce(&mut H) -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    let saved = host.toggles();
    host.set_toggles(HostToggles::suspended());
    let result = action(host);
    host.set_toggles(saved);
    result
}
