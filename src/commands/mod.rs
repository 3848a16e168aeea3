// commands/mod.rs
use uuid::Uuid;

use crate::models::PowerState;
use crate::registry::ObserverSender;

/// Where a power request originated. Broadcasts skip the originating
/// observer, which already knows the state it asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Internal,
    Observer(Uuid),
}

/// A manual power override, layered on top of the automatic curve.
#[derive(Debug, Clone, Copy)]
pub struct PowerRequest {
    pub power: PowerState,
    pub origin: Origin,
}

/// Everything the scheduler task is asked to do from the outside. Observer
/// membership goes through here too, so the registration snapshot and the
/// power state are read on the same task and can never tear.
#[derive(Debug)]
pub enum SchedulerCommand {
    SetPower(PowerRequest),
    Register { id: Uuid, sender: ObserverSender },
    Deregister { id: Uuid },
}

/// Parses an inbound switch message. Only the literal words `on` and `off`
/// (case-insensitive) are commands; anything else is noise from the client.
pub fn parse_switch_message(text: &str) -> Option<PowerState> {
    if text.eq_ignore_ascii_case("on") {
        Some(PowerState::On)
    } else if text.eq_ignore_ascii_case("off") {
        Some(PowerState::Off)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_on_and_off_in_any_case() {
        assert_eq!(parse_switch_message("on"), Some(PowerState::On));
        assert_eq!(parse_switch_message("ON"), Some(PowerState::On));
        assert_eq!(parse_switch_message("On"), Some(PowerState::On));
        assert_eq!(parse_switch_message("off"), Some(PowerState::Off));
        assert_eq!(parse_switch_message("OFF"), Some(PowerState::Off));
    }

    #[test]
    fn rejects_everything_else() {
        assert_eq!(parse_switch_message(""), None);
        assert_eq!(parse_switch_message("dim"), None);
        assert_eq!(parse_switch_message("on "), None);
        assert_eq!(parse_switch_message("{\"power\": true}"), None);
    }
}
