// SPDX-License-Identifier: MPL-2.0

//! Ringer mode sources.

use crate::{error::Result, platform::RingerMode};
use otousan_config::RingerSource;
use zbus::blocking::{Connection, Proxy};

const FEEDBACKD_NAME: &str = "org.sigxcpu.Feedback";
const FEEDBACKD_PATH: &str = "/org/sigxcpu/Feedback";
const FEEDBACKD_INTERFACE: &str = "org.sigxcpu.Feedback";

/// The feedbackd profile that plays sounds.
pub const NORMAL_PROFILE: &str = "full";

#[must_use]
pub fn profile_is_normal(profile: &str) -> bool {
    profile.trim().eq_ignore_ascii_case(NORMAL_PROFILE)
}

/// Reads the feedback profile from feedbackd on the session bus.
pub struct FeedbackdRinger {
    proxy: Proxy<'static>,
}

impl FeedbackdRinger {
    pub fn connect() -> Result<Self> {
        let connection = Connection::session()?;
        let proxy = Proxy::new(
            &connection,
            FEEDBACKD_NAME,
            FEEDBACKD_PATH,
            FEEDBACKD_INTERFACE,
        )?;
        Ok(Self { proxy })
    }

    pub fn profile(&self) -> Result<String> {
        Ok(self.proxy.get_property::<String>("Profile")?)
    }
}

impl RingerMode for FeedbackdRinger {
    fn is_normal(&self) -> bool {
        match self.profile() {
            Ok(profile) => {
                tracing::trace!(%profile, "feedback profile");
                profile_is_normal(&profile)
            }
            Err(why) => {
                tracing::warn!(?why, "failed to read feedback profile, assuming normal");
                true
            }
        }
    }
}

pub enum Ringer {
    Feedbackd(FeedbackdRinger),
    Fixed { normal: bool },
}

impl std::fmt::Debug for Ringer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ringer::Feedbackd(_) => f.write_str("Feedbackd"),
            Ringer::Fixed { normal } => f.debug_struct("Fixed").field("normal", normal).finish(),
        }
    }
}

impl Ringer {
    /// Builds the configured source. An unreachable feedbackd is treated as
    /// always normal.
    pub fn from_source(source: RingerSource) -> Self {
        match source {
            RingerSource::Feedbackd => match FeedbackdRinger::connect() {
                Ok(ringer) => Ringer::Feedbackd(ringer),
                Err(why) => {
                    tracing::warn!(?why, "feedbackd unavailable, ringer assumed normal");
                    Ringer::Fixed { normal: true }
                }
            },
            RingerSource::Normal => Ringer::Fixed { normal: true },
            RingerSource::Silent => Ringer::Fixed { normal: false },
        }
    }
}

impl RingerMode for Ringer {
    fn is_normal(&self) -> bool {
        match self {
            Ringer::Feedbackd(ringer) => ringer.is_normal(),
            Ringer::Fixed { normal } => *normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_full_profile_is_normal() {
        assert!(profile_is_normal("full"));
        assert!(profile_is_normal(" Full\n"));
        assert!(!profile_is_normal("quiet"));
        assert!(!profile_is_normal("silent"));
        assert!(!profile_is_normal(""));
    }

    #[test]
    fn fixed_sources_answer_directly() {
        assert!(Ringer::from_source(RingerSource::Normal).is_normal());
        assert!(!Ringer::from_source(RingerSource::Silent).is_normal());
    }
}
