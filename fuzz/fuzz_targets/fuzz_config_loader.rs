#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = pump_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A config that validates must map onto session settings.
            let _ = pump_core::SessionSettings::try_from(&cfg);
            for p in &cfg.pumps {
                let _ = pump_core::conversions::request_for(p, &cfg.defaults);
            }
        }
    }
});
