//! Channel-hop scheduler.
//!
//! Cycles the listening channel through `init..=max`, wrapping at the top.
//! The in-memory channel only moves once the radio has accepted the new one,
//! so a rejected hop is retried on the same target at the next boundary.

use crate::error::RadioError;
use crate::platform::{Radio, SecondaryChannel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopConfig {
    pub enabled: bool,
    pub init_channel: u8,
    pub max_channel: u8,
}

#[derive(Debug)]
pub struct ChannelHopper {
    cfg: HopConfig,
    current: u8,
}

impl ChannelHopper {
    /// Starts on the initial channel.
    pub fn new(cfg: HopConfig) -> Self {
        Self {
            cfg,
            current: cfg.init_channel,
        }
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    /// Channel that follows `self.current()`.
    pub fn next_channel(&self) -> u8 {
        if self.current >= self.cfg.max_channel {
            self.cfg.init_channel
        } else {
            self.current + 1
        }
    }

    /// Hop to the next channel. Returns the channel now in use, or `None`
    /// when hopping is disabled.
    pub fn advance(&mut self, radio: &mut dyn Radio) -> Result<Option<u8>, RadioError> {
        if !self.cfg.enabled {
            return Ok(None);
        }
        let next = self.next_channel();
        radio.set_channel(next, SecondaryChannel::None)?;
        self.current = next;
        log::debug!("Channel set to {next}");
        Ok(Some(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakeRadio;

    fn hopper(enabled: bool) -> ChannelHopper {
        ChannelHopper::new(HopConfig {
            enabled,
            init_channel: 1,
            max_channel: 13,
        })
    }

    #[test]
    fn test_advance_wraps_at_max() {
        let mut radio = FakeRadio::default();
        let mut hop = hopper(true);
        for c in 1..=13u8 {
            assert_eq!(hop.current(), c);
            let expected = if c < 13 { c + 1 } else { 1 };
            assert_eq!(hop.advance(&mut radio).unwrap(), Some(expected));
        }
        assert_eq!(hop.current(), 1);
        assert_eq!(radio.state().channels.len(), 13);
        assert_eq!(radio.state().channels.last(), Some(&1));
    }

    #[test]
    fn test_disabled_hop_is_noop() {
        let mut radio = FakeRadio::default();
        let mut hop = hopper(false);
        for _ in 0..20 {
            assert_eq!(hop.advance(&mut radio).unwrap(), None);
        }
        assert_eq!(hop.current(), 1);
        assert!(radio.state().channels.is_empty());
    }

    #[test]
    fn test_rejected_channel_keeps_state() {
        let mut radio = FakeRadio::default();
        radio.state().fail_set_channel = true;
        let mut hop = hopper(true);
        assert!(hop.advance(&mut radio).is_err());
        assert_eq!(hop.current(), 1);

        radio.state().fail_set_channel = false;
        assert_eq!(hop.advance(&mut radio).unwrap(), Some(2));
    }
}
