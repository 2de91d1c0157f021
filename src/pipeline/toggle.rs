//! Keyboard-style preset toggles.
//!
//! Small helper for host applications that want to flip the pipeline
//! between common inspection states at runtime, the way a debug key
//! binding would.

use super::settings::{DebugMode, SsrtSettings};

/// A preset adjustment applied on top of the current settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    /// Enable the effect with the combined composite output.
    EnableCombined,
    /// Disable the effect entirely.
    Disable,
    /// Show the indirect diffuse signal on top of the scene.
    DebugGi,
    /// Show the indirect diffuse signal alone.
    DebugGiLightOnly,
    /// Show the ambient occlusion term.
    DebugAo,
    /// Flip temporal accumulation on or off.
    FlipTemporalAccumulation,
    /// Flip denoising on or off.
    FlipDenoising,
}

impl ToggleAction {
    /// Apply this preset to `settings`.
    pub fn apply(self, settings: &mut SsrtSettings) {
        match self {
            ToggleAction::EnableCombined => {
                settings.set_enabled(true);
                settings.set_debug_mode(DebugMode::None);
                settings.set_light_only(false);
            }
            ToggleAction::Disable => {
                settings.set_enabled(false);
            }
            ToggleAction::DebugGi => {
                settings.set_enabled(true);
                settings.set_debug_mode(DebugMode::Gi);
                settings.set_light_only(false);
            }
            ToggleAction::DebugGiLightOnly => {
                settings.set_enabled(true);
                settings.set_debug_mode(DebugMode::Gi);
                settings.set_light_only(true);
            }
            ToggleAction::DebugAo => {
                settings.set_enabled(true);
                settings.set_debug_mode(DebugMode::Ao);
                settings.set_light_only(false);
            }
            ToggleAction::FlipTemporalAccumulation => {
                settings.set_temporal_accumulation(!settings.temporal_accumulation());
            }
            ToggleAction::FlipDenoising => {
                settings.set_denoising(!settings.denoising());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_combined() {
        let mut settings = SsrtSettings::default();
        settings.set_debug_mode(DebugMode::Ao);
        settings.set_light_only(true);
        ToggleAction::EnableCombined.apply(&mut settings);
        assert!(settings.enabled());
        assert_eq!(settings.debug_mode(), DebugMode::None);
        assert!(!settings.light_only());
    }

    #[test]
    fn test_disable_keeps_view_selection() {
        let mut settings = SsrtSettings::default();
        ToggleAction::DebugAo.apply(&mut settings);
        ToggleAction::Disable.apply(&mut settings);
        assert!(!settings.enabled());
        assert_eq!(settings.debug_mode(), DebugMode::Ao);
    }

    #[test]
    fn test_gi_light_only_bundle() {
        let mut settings = SsrtSettings::default();
        ToggleAction::DebugGiLightOnly.apply(&mut settings);
        assert!(settings.enabled());
        assert_eq!(settings.debug_mode(), DebugMode::Gi);
        assert!(settings.light_only());

        ToggleAction::DebugGi.apply(&mut settings);
        assert!(!settings.light_only());
    }

    #[test]
    fn test_flips_are_involutions() {
        let mut settings = SsrtSettings::default();
        let temporal = settings.temporal_accumulation();
        let denoising = settings.denoising();

        ToggleAction::FlipTemporalAccumulation.apply(&mut settings);
        assert_eq!(settings.temporal_accumulation(), !temporal);
        ToggleAction::FlipTemporalAccumulation.apply(&mut settings);
        assert_eq!(settings.temporal_accumulation(), temporal);

        ToggleAction::FlipDenoising.apply(&mut settings);
        assert_eq!(settings.denoising(), !denoising);
        ToggleAction::FlipDenoising.apply(&mut settings);
        assert_eq!(settings.denoising(), denoising);
    }
}
