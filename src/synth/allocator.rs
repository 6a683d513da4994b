/// Picks which sounding voice gives way when every slot is busy.
pub trait VoiceStealer: Send {
    /// Return a slot index in `0..limit`. Called only when all of them are active.
    fn pick_victim(&mut self, limit: usize) -> usize;

    fn reset(&mut self) {}
}

/// Strict rotation through the slots, ignoring note, age and envelope stage.
#[derive(Debug, Default, Clone)]
pub struct RoundRobin {
    next: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VoiceStealer for RoundRobin {
    fn pick_victim(&mut self, limit: usize) -> usize {
        let limit = limit.max(1);
        let victim = self.next % limit;
        self.next = (self.next + 1) % limit;
        victim
    }

    fn reset(&mut self) {
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_through_slots() {
        let mut rr = RoundRobin::new();
        let picks: Vec<usize> = (0..7).map(|_| rr.pick_victim(3)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn shrinking_limit_stays_in_range() {
        let mut rr = RoundRobin::new();
        for _ in 0..5 {
            rr.pick_victim(8);
        }
        assert_eq!(rr.pick_victim(2), 1);
        assert_eq!(rr.pick_victim(2), 0);
        assert_eq!(rr.pick_victim(0), 0);
    }
}
