use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

/// Flags describing the kind of audio a client is transmitting.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SpeakingState(u8);

impl SpeakingState {
    /// Normal transmission of voice audio.
    pub const MICROPHONE: Self = Self(1);
    /// Transmission of context audio for video, no speaking indicator.
    pub const SOUNDSHARE: Self = Self(1 << 1);
    /// Priority speaker, lowering audio of other speakers.
    pub const PRIORITY: Self = Self(1 << 2);

    /// No audio is being sent.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw flag bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if all flags in `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets or clears the flags in `other`.
    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl BitOr for SpeakingState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SpeakingState {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_toggle_independently() {
        let mut state = SpeakingState::PRIORITY;
        state.set(SpeakingState::MICROPHONE, true);
        assert!(state.contains(SpeakingState::MICROPHONE | SpeakingState::PRIORITY));

        state.set(SpeakingState::MICROPHONE, false);
        assert_eq!(state, SpeakingState::PRIORITY);
        assert_eq!(serde_json::to_string(&state).unwrap(), "4");
    }
}
