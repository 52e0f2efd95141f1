//! Device-twin reconciliation: desired-state updates, reported state and
//! remote commands.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::cloud::CommandResponse;
use crate::hw::{Actuator, LedBank, OutputPin};

const MANUFACTURER: &str = "Seeed Studio";
const MODEL: &str = "MT3620 Dev Kit";

#[derive(Serialize)]
struct DeviceInfo {
    manufacturer: &'static str,
    model: &'static str,
}

/// Static metadata reported once per successful authentication.
pub fn device_info() -> String {
    let info = DeviceInfo {
        manufacturer: MANUFACTURER,
        model: MODEL,
    };
    // Serializing a struct of string constants cannot fail.
    serde_json::to_string(&info).unwrap_or_default()
}

/// Applies a desired-state document to the actuators and returns the
/// reported-state documents to send back.
///
/// Fields may live under a top-level `desired` object or at the root. Each
/// present boolean is applied to its actuator; afterwards the state of all
/// four actuators is reported, not just the ones that changed. An
/// unparsable payload drops the whole update without touching anything,
/// and a payload that parses to a non-object carries no fields, so it is
/// dropped the same way rather than triggering an empty-delta report.
pub fn reconcile<P: OutputPin>(payload: &str, leds: &mut LedBank<P>) -> Option<Vec<String>> {
    let document: Value = match serde_json::from_str(payload) {
        Ok(document) => document,
        Err(err) => {
            warn!("cannot parse desired state update: {err}");
            return None;
        }
    };
    let Some(root) = document.as_object() else {
        warn!("desired state update is not an object");
        return None;
    };
    let desired = root
        .get("desired")
        .and_then(Value::as_object)
        .unwrap_or(root);

    for actuator in Actuator::ALL {
        if let Some(on) = desired.get(actuator.field()).and_then(Value::as_bool) {
            info!(field = actuator.field(), on, "applying desired state");
            leds.set(actuator, on);
        }
    }

    Some(
        Actuator::ALL
            .iter()
            .map(|actuator| format!("{{\"{}\":{}}}", actuator.field(), leds.get(*actuator)))
            .collect(),
    )
}

/// Handles a remote command and produces the response for the backend.
pub fn handle_command(name: &str) -> CommandResponse {
    if name == "TriggerAlarm" {
        info!("----- ALARM TRIGGERED! -----");
        CommandResponse {
            status: 200,
            // The body must be a JSON string, hence the quotes.
            body: "\"Alarm Triggered\"".to_string(),
        }
    } else {
        CommandResponse {
            status: -1,
            body: "{}".to_string(),
        }
    }
}
