//! Controller counting and classification.
//!
//! Steam Input mirrors every physical pad as a virtual device, so a naive
//! device count doubles up; the virtual entries are filtered out here. The
//! Steam Deck's built-in control surface is a special case: it counts as
//! exactly one player, but only when no external pads are connected.

use crate::debugln;

use evdev::*;

pub const MAX_PLAYERS: usize = 4;

const VENDOR_VALVE: u16 = 0x28de;
const PRODUCT_STEAM_VIRTUAL_PAD: u16 = 0x11ff;
const PRODUCT_STEAM_DECK: u16 = 0x1205;

/// Identity of one gamepad-capable device, detached from any evdev handle
/// so the counting rules stay testable.
#[derive(Clone, Debug)]
pub struct PadDescriptor {
    pub vendor: u16,
    pub product: u16,
    pub name: String,
}

/// Steam Input's virtual mirror of a physical pad.
fn is_virtual_pad(pad: &PadDescriptor) -> bool {
    (pad.vendor == VENDOR_VALVE && pad.product == PRODUCT_STEAM_VIRTUAL_PAD)
        || pad.name.contains("Steam Virtual Gamepad")
}

/// The handheld's integrated control surface.
fn is_builtin_pad(pad: &PadDescriptor) -> bool {
    (pad.vendor == VENDOR_VALVE && pad.product == PRODUCT_STEAM_DECK)
        || pad.name.contains("Steam Deck")
}

/// Player count for a set of gamepad devices, clamped to [0,4].
pub fn count_players(pads: &[PadDescriptor]) -> usize {
    let mut external = 0;
    let mut builtin_present = false;

    for pad in pads {
        if is_virtual_pad(pad) {
            continue;
        }
        if is_builtin_pad(pad) {
            builtin_present = true;
            continue;
        }
        external += 1;
    }

    let count = if external == 0 && builtin_present {
        1
    } else {
        external
    };
    count.min(MAX_PLAYERS)
}

/// Enumerate gamepad devices and return the current player count.
pub fn snapshot_count() -> usize {
    let mut pads: Vec<PadDescriptor> = Vec::new();

    for (path, dev) in evdev::enumerate() {
        let is_gamepad = dev
            .supported_keys()
            .map_or(false, |keys| keys.contains(KeyCode::BTN_SOUTH));
        if !is_gamepad {
            continue;
        }

        let id = dev.input_id();
        let name = dev.name().unwrap_or("").to_string();
        debugln!(
            "input - {}: {} ({:04x}:{:04x})",
            path.display(),
            name,
            id.vendor(),
            id.product()
        );

        pads.push(PadDescriptor {
            vendor: id.vendor(),
            product: id.product(),
            name,
        });
    }

    count_players(&pads)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(vendor: u16, product: u16, name: &str) -> PadDescriptor {
        PadDescriptor {
            vendor,
            product,
            name: name.to_string(),
        }
    }

    fn xbox() -> PadDescriptor {
        pad(0x045e, 0x02ea, "Microsoft X-Box One S pad")
    }

    #[test]
    fn no_pads_means_zero_players() {
        assert_eq!(count_players(&[]), 0);
    }

    #[test]
    fn virtual_mirrors_are_not_counted() {
        let pads = vec![
            xbox(),
            pad(0x28de, 0x11ff, "Microsoft X-Box 360 pad 0"),
            pad(0, 0, "Steam Virtual Gamepad"),
        ];
        assert_eq!(count_players(&pads), 1);
    }

    #[test]
    fn builtin_alone_counts_as_one() {
        let pads = vec![pad(0x28de, 0x1205, "Steam Deck")];
        assert_eq!(count_players(&pads), 1);
    }

    #[test]
    fn builtin_is_ignored_next_to_external_pads() {
        let pads = vec![pad(0x28de, 0x1205, "Steam Deck"), xbox(), xbox()];
        assert_eq!(count_players(&pads), 2);
    }

    #[test]
    fn count_is_clamped_to_four() {
        let pads: Vec<PadDescriptor> = (0..6).map(|_| xbox()).collect();
        assert_eq!(count_players(&pads), 4);
    }
}
