//! Property tests for command parsing and reply encoding

use proptest::prelude::*;
use rs_ramps::{Command, CommandKind, ErrorCode, Reply, ReplyStatus};

const KNOWN_INTERFACES: [&str; 12] = [
    "position", "pos", "velocity", "vel", "speed", "state", "stop", "reset", "enable", "disable",
    "config", "calibrate",
];

#[test]
fn examples_from_the_wire() {
    let cmd: Command = "X POSITION 1.57".parse().unwrap();
    assert_eq!(
        (cmd.name.as_str(), cmd.interface.as_str(), cmd.kind, cmd.query, cmd.value.as_str()),
        ("X", "position", CommandKind::Position, false, "1.57")
    );

    let cmd: Command = "X POSITION?".parse().unwrap();
    assert!(cmd.query);
    assert_eq!(cmd.interface.as_str(), "position");
    assert_eq!(cmd.value.as_str(), "");

    let cmd: Command = "FAN ON".parse().unwrap();
    assert_eq!(cmd.kind, CommandKind::On);
}

#[test]
fn error_replies_keep_the_code() {
    let reply = Reply::error("X", ErrorCode::OutOfRange, "");
    assert_eq!(reply.encode(), "ERROR: Value out of range X (X)");
    let decoded = Reply::decode(&reply.encode());
    assert_eq!(decoded.status, ReplyStatus::Error);
    assert_eq!(decoded.device, "X");
}

proptest! {
    #[test]
    fn parse_never_panics(line in "\\PC{0,80}") {
        let _ = line.parse::<Command>();
    }

    #[test]
    fn bare_name_parses_iff_non_blank(line in "[ >]{0,3}[A-Z_]{0,8}[ ]{0,3}") {
        let trimmed = line.trim();
        let body = trimmed.strip_prefix('>').unwrap_or(trimmed).trim();
        prop_assert_eq!(line.parse::<Command>().is_ok(), !body.is_empty());
    }

    #[test]
    fn fields_survive_parsing(
        name in "[A-Z][A-Z0-9_]{0,10}",
        iface in prop::sample::select(KNOWN_INTERFACES.to_vec()),
        value in "-?[0-9]{1,4}(\\.[0-9]{1,3})?",
        query in any::<bool>(),
    ) {
        prop_assume!(name != "SERVICE");
        let line = if query {
            format!(">{name} {}?", iface.to_uppercase())
        } else {
            format!(">{name} {} {value}", iface.to_uppercase())
        };

        let cmd: Command = line.parse().unwrap();
        prop_assert_eq!(cmd.name.as_str(), name.as_str());
        prop_assert_eq!(cmd.interface.as_str(), iface);
        prop_assert_eq!(cmd.kind, CommandKind::from_token(iface));
        prop_assert_eq!(cmd.query, query);
        if !query {
            prop_assert_eq!(cmd.value.as_str(), value.as_str());
        }
        prop_assert_eq!(cmd.to_line().parse::<Command>().unwrap(), cmd);
    }

    #[test]
    fn encoded_replies_decode_to_the_same_fields(
        device in "[A-Z][A-Z_]{0,7}",
        interface in "[a-z]{1,8}",
        value in "[0-9]{1,4}(\\.[0-9]{1,3})?",
        status in prop::sample::select(vec![ReplyStatus::Ok, ReplyStatus::Value, ReplyStatus::Event]),
    ) {
        let reply = match status {
            ReplyStatus::Ok => Reply::ok(&device, &interface).with_value(&value),
            ReplyStatus::Value => Reply::value(&device, &interface, &value),
            _ => Reply::event(&device, &interface, &value),
        };

        let decoded = Reply::decode(&reply.encode());
        prop_assert_eq!(decoded.status, status);
        prop_assert_eq!(decoded.device, device);
        prop_assert_eq!(decoded.interface, interface);
        prop_assert_eq!(decoded.value, value);
    }
}
