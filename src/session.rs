//! Slot and session bookkeeping.

use crate::config::SessionMode;

use std::time::Instant;

pub const MAX_SLOTS: usize = 4;

/// One of four fixed player positions a game instance occupies.
///
/// `worker_resolved` flips false -> true at most once per occupancy, when
/// the real worker process behind the wrapper has been identified.
#[derive(Default, Clone)]
pub struct Slot {
    pub occupied: bool,
    pub wrapper_pid: Option<u32>,
    pub worker_pid: Option<u32>,
    pub worker_resolved: bool,
    pub launched_at: Option<Instant>,
}

impl Slot {
    pub fn clear(&mut self) {
        *self = Slot::default();
    }
}

pub struct SessionState {
    pub mode: SessionMode,
    pub active_count: usize,
    pub ever_launched: bool,
}

impl SessionState {
    pub fn new(mode: SessionMode) -> Self {
        Self {
            mode,
            active_count: 0,
            ever_launched: false,
        }
    }
}

pub fn count_active(slots: &[Slot]) -> usize {
    slots.iter().filter(|slot| slot.occupied).count()
}

pub fn next_free(slots: &[Slot]) -> Option<usize> {
    slots.iter().position(|slot| !slot.occupied)
}

pub fn occupied_ordinals(slots: &[Slot]) -> Vec<usize> {
    slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.occupied)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupied() -> Slot {
        Slot {
            occupied: true,
            launched_at: Some(Instant::now()),
            ..Slot::default()
        }
    }

    #[test]
    fn active_count_never_exceeds_slot_count() {
        let slots = [occupied(), occupied(), occupied(), occupied()];
        assert_eq!(count_active(&slots), MAX_SLOTS);
        assert_eq!(next_free(&slots), None);
    }

    #[test]
    fn occupied_ordinals_are_distinct_and_ordered() {
        let slots = [occupied(), Slot::default(), occupied(), Slot::default()];
        assert_eq!(occupied_ordinals(&slots), vec![0, 2]);
        assert_eq!(count_active(&slots), 2);
        assert_eq!(next_free(&slots), Some(1));
    }

    #[test]
    fn clear_resets_all_identity() {
        let mut slot = occupied();
        slot.worker_pid = Some(99);
        slot.worker_resolved = true;
        slot.clear();
        assert!(!slot.occupied);
        assert!(slot.worker_pid.is_none());
        assert!(!slot.worker_resolved);
        assert!(slot.launched_at.is_none());
    }
}
