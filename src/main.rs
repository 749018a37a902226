use glitch_overlay::effects::build_sequence;
use glitch_overlay::hotkey::{self, KeyCombo, KillSignal};
use glitch_overlay::ip_lookup::IpLocator;
use glitch_overlay::logging;
use glitch_overlay::overlay;
use glitch_overlay::settings::Settings;

fn main() -> anyhow::Result<()> {
    let settings_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "settings.json".to_string());
    // Logging is configured by the settings, so warnings raised while
    // loading them go to stderr.
    let bootstrap = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .finish();
    let settings =
        tracing::subscriber::with_default(bootstrap, || Settings::load(&settings_path))?;
    logging::init(settings.debug_logging, settings.log_file.clone());
    tracing::debug!(path = %settings_path, ?settings, "settings loaded");

    let lookup = settings
        .ip_lookup
        .then(|| IpLocator::from_settings(&settings).spawn());

    // The overlay must never start without a working escape hatch.
    let signal = KillSignal::new();
    let kill_switch = hotkey::watch(KeyCombo::kill_switch(), signal.clone())?;
    tracing::info!(combo = %kill_switch.combo(), "kill switch armed");

    let location = lookup.and_then(|l| l.wait());
    let sequence = build_sequence(&settings, location.as_ref())?;

    let reason = overlay::run(sequence, &settings, signal)?;
    if let Some(err) = kill_switch.failure() {
        return Err(err.into());
    }
    tracing::info!(?reason, "overlay session finished");
    Ok(())
}
