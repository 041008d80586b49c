#![no_main]
use libfuzzer_sys::fuzz_target;
use pump_core::{Input, PumpModel, Report};

fuzz_target!(|data: &str| {
    let mut model = PumpModel::default();
    model.apply(&Input::Connected { port: "FUZZ".into() });
    for line in data.lines() {
        let report = pump_core::report::parse(line);
        if let Report::ProgressDetailed(s) = &report {
            assert!(s.percent.is_finite());
        }
        model.apply(&Input::Report(report));
        assert!((0.0..=100.0).contains(&model.display_percent));
    }
});
