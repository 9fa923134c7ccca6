//! Startup banner.

use std::fmt::Write;

use crate::settings::Settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Render the banner summarising the resolved configuration.
pub fn render(settings: &Settings) -> String {
    let mut out = String::new();
    let title = format!("{} v{}", settings.server.name, VERSION);
    let _ = writeln!(out, "╔{}╗", "═".repeat(64));
    let _ = writeln!(out, "║{:^64}║", title);
    let _ = writeln!(out, "║{:^64}║", "Adversarial NTP Daemon for Testing");
    let _ = writeln!(out, "╚{}╝", "═".repeat(64));
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "WARNING: This server distributes INACCURATE time information!"
    );
    let _ = writeln!(out, "WARNING: Deploy ONLY in isolated test environments!");
    let _ = writeln!(out);
    let _ = writeln!(out, "Configuration:");
    let _ = writeln!(
        out,
        "  Listening:      {}:{}",
        settings.server.host, settings.server.port
    );
    let _ = writeln!(
        out,
        "  Stratum:        {} (0=invalid, 1=primary, 2-15=secondary)",
        settings.ntp.stratum
    );
    let _ = writeln!(out, "  Reference ID:   {}", settings.ntp.reference_id);
    let _ = writeln!(
        out,
        "  Initial Offset: ±{} minutes",
        settings.time_manipulation.initial_offset_minutes
    );
    let _ = writeln!(
        out,
        "  Jitter:         ±{} seconds",
        settings.time_manipulation.jitter_seconds
    );
    let _ = writeln!(
        out,
        "  Distribution:   {}",
        settings.time_manipulation.distribution
    );
    let _ = writeln!(out, "  Log Format:     {}", settings.logging.format.as_str());
    let _ = writeln!(out);
    let _ = writeln!(out, "Starting server...");
    out
}
