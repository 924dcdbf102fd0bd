//! Pin multiplexer seam.
//!
//! Facades route their signals once at init time from a table of
//! [`PinAssignment`]s; the pinmux is not touched on the data path.

/// Pin direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Input
    Input,
    /// Output
    Output,
}

/// Internal pull resistor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    /// Floating
    #[default]
    None,
    /// Pull up
    Up,
    /// Pull down
    Down,
}

/// One signal routed to one pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinAssignment {
    /// Pin number
    pub pin: u8,
    /// Alternate function selector
    pub function: u8,
    /// Direction
    pub direction: Direction,
    /// Pull mode
    pub pull: Pull,
}

impl PinAssignment {
    /// Output pin without pull.
    pub const fn output(pin: u8, function: u8) -> Self {
        Self {
            pin,
            function,
            direction: Direction::Output,
            pull: Pull::None,
        }
    }

    /// Input pin with pull-up.
    pub const fn input(pin: u8, function: u8) -> Self {
        Self {
            pin,
            function,
            direction: Direction::Input,
            pull: Pull::Up,
        }
    }
}

/// GPIO / IO-mux register layer.
pub trait PinMux {
    /// Select alternate `function` on `pin`.
    fn iomux_select(&mut self, pin: u8, function: u8);
    /// Set the pin direction.
    fn set_direction(&mut self, pin: u8, direction: Direction);
    /// Set the pull resistor.
    fn set_pull_mode(&mut self, pin: u8, pull: Pull);
}

/// Route every assignment in `pins`.
pub fn route(mux: &mut dyn PinMux, pins: &[PinAssignment]) {
    for p in pins {
        mux.iomux_select(p.pin, p.function);
        mux.set_direction(p.pin, p.direction);
        mux.set_pull_mode(p.pin, p.pull);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPinMux;

    #[test]
    fn route_programs_each_pin() {
        let mut mux = MockPinMux::new();
        route(
            &mut mux,
            &[PinAssignment::output(8, 2), PinAssignment::input(9, 2)],
        );
        assert_eq!(mux.pin(8), Some((2, Direction::Output, Pull::None)));
        assert_eq!(mux.pin(9), Some((2, Direction::Input, Pull::Up)));
        assert_eq!(mux.pin(10), None);
    }
}
