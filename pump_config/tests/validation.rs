use pump_config::{BackpressureCfg, load_toml};
use rstest::rstest;

#[test]
fn empty_file_is_a_valid_config() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults should validate");
    assert_eq!(cfg.serial.baud, 115_200);
    assert_eq!(cfg.serial.settle_ms, 2_000);
    assert_eq!(cfg.session.poll_ms, 100);
    assert_eq!(cfg.session.backpressure, BackpressureCfg::Block);
    assert_eq!(cfg.defaults.volume_ml, 5.0);
    assert_eq!(cfg.defaults.rate_ml_min, 10.0);
    assert!(cfg.pumps.is_empty());
}

#[test]
fn full_config_parses() {
    let toml = r#"
[serial]
baud = 9600
settle_ms = 1500
timeout_ms = 50

[session]
poll_ms = 50
queue_capacity = 16
backpressure = "drop_oldest"
comm_log_lines = 100

[defaults]
volume_ml = 2.5
rate_ml_min = 4

[logging]
file = "pump.log"
level = "debug"
rotation = "daily"

[[pumps]]
name = "Buffer A"
port = "/dev/ttyACM0"
volume_ml = 1

[[pumps]]
name = "Buffer B"
port = "/dev/ttyACM1"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.serial.baud, 9600);
    assert_eq!(cfg.serial.read_timeout_ms, 50);
    assert_eq!(cfg.session.backpressure, BackpressureCfg::DropOldest);
    assert_eq!(cfg.pumps.len(), 2);
    assert_eq!(cfg.pumps[0].volume_or(&cfg.defaults), 1.0);
    assert_eq!(cfg.pumps[0].rate_or(&cfg.defaults), 4.0);
    assert_eq!(cfg.pumps[1].volume_or(&cfg.defaults), 2.5);
}

#[rstest]
#[case("[serial]\nbaud = 57600\n", "serial.baud must be one of")]
#[case("[serial]\nread_timeout_ms = 0\n", "serial.read_timeout_ms must be >= 1")]
#[case("[serial]\nread_timeout_ms = 1001\n", "serial.read_timeout_ms must be <= 1000")]
#[case("[session]\npoll_ms = 0\n", "session.poll_ms must be >= 1")]
#[case("[session]\nqueue_capacity = 0\n", "session.queue_capacity must be >= 1")]
#[case("[defaults]\nvolume_ml = 0.0\n", "defaults.volume_ml must be > 0")]
#[case("[defaults]\nrate_ml_min = -1.0\n", "defaults.rate_ml_min must be > 0")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation must be one of")]
#[case(
    "[[pumps]]\nname = \"A\"\nport = \"COM3\"\nrate_ml_min = 0\n",
    "pumps[0].rate_ml_min must be > 0"
)]
#[case("[[pumps]]\nname = \" \"\nport = \"COM3\"\n", "pumps[0].name must not be empty")]
#[case(
    "[[pumps]]\nname = \"A\"\nport = \"COM3\"\n[[pumps]]\nname = \"B\"\nport = \"COM3\"\n",
    "used by more than one pump"
)]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("config should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "expected {needle:?} in {err}"
    );
}

#[test]
fn unknown_backpressure_policy_is_a_parse_error() {
    assert!(load_toml("[session]\nbackpressure = \"yolo\"\n").is_err());
}
