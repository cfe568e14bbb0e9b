//! Best-effort dismissal of overlays that land on top of the UI.
//!
//! Cookie banners, onboarding modals, and feature-tour popovers all steal
//! clicks from the real flow. Every pattern here is tried on every sweep;
//! nothing in this module is allowed to fail a run.

use std::time::Duration;
use ticketpilot::Session;
use tracing::{debug, info};

/// Known dismiss controls, most common first. Order matters: cookie banners
/// usually sit above everything else.
const DISMISS_CANDIDATES: &[&str] = &[
    // Cookie consent
    "button:text:Accept",
    "#cookies-consent button.btn-primary",
    // Bootstrap-style modals
    ".modal.show .btn-close",
    ".modal.show button:text:Close",
    "button[aria-label='Close']",
    // Onboarding / feature tours
    "button:text:Skip",
    "button:text:Got it",
    ".popover .btn-close",
    ".o_onboarding_container .o_onboarding_btn_close",
];

const PROBE_TIMEOUT: Duration = Duration::from_millis(400);

/// Sweep the known overlay patterns once, clicking whatever is present.
/// Returns how many overlays were dismissed.
pub async fn dismiss_known_popups(session: &Session) -> usize {
    let mut dismissed = 0;
    for candidate in DISMISS_CANDIDATES {
        let locator = session.locator(*candidate);
        match locator.wait(Some(PROBE_TIMEOUT)).await {
            Ok(element) => match element.click().await {
                Ok(()) => {
                    info!(candidate, "Dismissed popup");
                    dismissed += 1;
                    // Give the overlay's close animation a moment
                    tokio::time::sleep(Duration::from_millis(300)).await;
                }
                Err(e) => {
                    debug!(candidate, "Popup dismiss click failed: {e}");
                }
            },
            Err(e) => {
                debug!(candidate, "No popup for candidate: {e}");
            }
        }
    }
    dismissed
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketpilot::Selector;

    #[test]
    fn test_candidates_all_parse() {
        for candidate in DISMISS_CANDIDATES {
            let selector = Selector::from(*candidate);
            assert!(
                selector.validity_error().is_none(),
                "candidate does not parse: {candidate}"
            );
        }
    }

    #[test]
    fn test_candidates_unique() {
        let mut seen = std::collections::HashSet::new();
        for candidate in DISMISS_CANDIDATES {
            assert!(seen.insert(*candidate), "duplicate candidate: {candidate}");
        }
    }
}
