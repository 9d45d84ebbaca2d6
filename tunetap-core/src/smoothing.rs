//! Frame-to-frame rate limiting of the cents readout.

/// Default largest change in cents allowed per analysis frame.
pub const MAX_CENTS_JUMP: i32 = 8;

/// Caps how far `new_cents` may move away from `prev_cents` in one step.
///
/// Returns `(output, new_prev)`; both are the same value, since the
/// limiter always remembers what it last displayed.
pub fn smooth(new_cents: i32, prev_cents: i32, max_jump: i32) -> (i32, i32) {
    let delta = new_cents - prev_cents;
    let output = if delta.abs() > max_jump {
        prev_cents + delta.signum() * max_jump
    } else {
        new_cents
    };
    (output, output)
}

/// Fixed-step rate limiter holding the previously displayed cents value.
///
/// Lives as long as one recording session; [`Smoother::reset`] returns it to
/// the neutral value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smoother {
    prev_cents: i32,
    max_jump: i32,
}

impl Default for Smoother {
    fn default() -> Self {
        Self::new(MAX_CENTS_JUMP)
    }
}

impl Smoother {
    pub fn new(max_jump: i32) -> Self {
        Self {
            prev_cents: 0,
            max_jump,
        }
    }

    pub fn smooth(&mut self, new_cents: i32) -> i32 {
        let (output, prev) = smooth(new_cents, self.prev_cents, self.max_jump);
        self.prev_cents = prev;
        output
    }

    pub fn prev_cents(&self) -> i32 {
        self.prev_cents
    }

    pub fn reset(&mut self) {
        self.prev_cents = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_jump_converges_in_fixed_steps() {
        assert_eq!(smooth(20, 0, 8), (8, 8));
        assert_eq!(smooth(20, 8, 8), (16, 16));
        assert_eq!(smooth(20, 16, 8), (20, 20));
    }

    #[test]
    fn downward_jump_is_limited_too() {
        assert_eq!(smooth(-30, 5, 8), (-3, -3));
    }

    #[test]
    fn small_changes_pass_through() {
        assert_eq!(smooth(8, 0, 8), (8, 8));
        assert_eq!(smooth(-3, 4, 8), (-3, -3));
    }

    #[test]
    fn stateful_smoother_remembers_output() {
        let mut smoother = Smoother::default();
        assert_eq!(smoother.smooth(20), 8);
        assert_eq!(smoother.smooth(20), 16);
        assert_eq!(smoother.prev_cents(), 16);
        smoother.reset();
        assert_eq!(smoother.prev_cents(), 0);
        assert_eq!(smoother.smooth(-4), -4);
    }
}
