//! Outbound telemetry formatting.
//!
//! Messages are flat JSON objects with a single key per metric and numeric
//! values fixed at two decimal digits, matching what the backend dashboards
//! expect.

pub fn temperature(celsius: f32) -> String {
    format!("{{\"Temperature\":{celsius:.2}}}")
}

pub fn humidity(percent: f32) -> String {
    format!("{{\"Humidity\":{percent:.2}}}")
}

pub fn button_press() -> &'static str {
    "{\"ButtonPress\":\"True\"}"
}
