//! Control commands
//!
//! UI events and the detection step talk to the controller through an
//! unbounded channel of [`ControlCommand`]s. The controller consumes them in
//! arrival order on its own thread, so two paths racing on the same category
//! resolve to whichever command arrived last.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

use super::category::{FrequencyBand, SoundCategory};
use super::controller::{PipelineController, SourceHandle};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ControlCommand {
    Assemble(SourceHandle),
    ReplaceSource(SourceHandle),
    ApplyPreset(String),
    SetVolume(f32),
    SetAmplifyQuiet(u8),
    Suppress { category: String, band: FrequencyBand },
    Restore(String),
    Toggle(String),
    SetDetected(Vec<SoundCategory>),
}

impl ControlCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ControlCommand::Assemble(_) => "assemble",
            ControlCommand::ReplaceSource(_) => "replace_source",
            ControlCommand::ApplyPreset(_) => "apply_preset",
            ControlCommand::SetVolume(_) => "set_volume",
            ControlCommand::SetAmplifyQuiet(_) => "set_amplify_quiet",
            ControlCommand::Suppress { .. } => "suppress",
            ControlCommand::Restore(_) => "restore",
            ControlCommand::Toggle(_) => "toggle",
            ControlCommand::SetDetected(_) => "set_detected",
        }
    }
}

/// Create the command channel feeding a controller
pub fn command_channel() -> (Sender<ControlCommand>, Receiver<ControlCommand>) {
    unbounded()
}

/// Result of draining the command queue
#[derive(Debug, Default)]
pub struct DrainReport {
    pub handled: usize,
    /// Failed commands by name, in arrival order
    pub errors: Vec<(&'static str, PipelineError)>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl PipelineController {
    /// Apply one command synchronously
    pub fn handle(&mut self, command: ControlCommand) -> Result<()> {
        tracing::debug!(command = command.name(), "handling command");
        match command {
            ControlCommand::Assemble(source) => self.assemble(&source),
            ControlCommand::ReplaceSource(source) => self.replace_source(&source),
            ControlCommand::ApplyPreset(preset) => self.apply_preset(&preset),
            ControlCommand::SetVolume(volume) => {
                self.set_volume(volume);
                Ok(())
            }
            ControlCommand::SetAmplifyQuiet(level) => {
                self.set_amplify_quiet(level);
                Ok(())
            }
            ControlCommand::Suppress { category, band } => self.suppress_category(&category, band),
            ControlCommand::Restore(category) => {
                self.restore_category(&category);
                Ok(())
            }
            ControlCommand::Toggle(category) => self.toggle_category(&category).map(|_| ()),
            ControlCommand::SetDetected(categories) => {
                self.set_detected(categories);
                Ok(())
            }
        }
    }

    /// Handle every queued command without blocking
    ///
    /// A failing command does not stop the ones queued behind it.
    pub fn drain(&mut self, commands: &Receiver<ControlCommand>) -> DrainReport {
        let mut report = DrainReport::default();
        for command in commands.try_iter() {
            let name = command.name();
            if let Err(err) = self.handle(command) {
                tracing::warn!(command = name, error = %err, "command failed");
                report.errors.push((name, err));
            }
            report.handled += 1;
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::controller::AssemblyState;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_drain_in_arrival_order() {
        let (mut controller, _processor) = PipelineController::new(PipelineConfig::default()).unwrap();
        let (tx, rx) = command_channel();
        let band = FrequencyBand::new(400.0, 1200.0).unwrap();

        tx.send(ControlCommand::Assemble(SourceHandle::new("a.wav", 48000, 1))).unwrap();
        tx.send(ControlCommand::Suppress {
            category: "dog_bark".to_string(),
            band,
        })
        .unwrap();
        tx.send(ControlCommand::Restore("dog_bark".to_string())).unwrap();
        tx.send(ControlCommand::Suppress {
            category: "dog_bark".to_string(),
            band,
        })
        .unwrap();

        let report = controller.drain(&rx);
        assert_eq!(report.handled, 4);
        assert!(report.is_clean());
        assert_eq!(controller.assembly_state(), AssemblyState::Assembled);
        assert_eq!(controller.suppressed(), vec!["dog_bark".to_string()]);
    }

    #[test]
    fn test_failures_do_not_stop_the_queue() {
        let (mut controller, _processor) = PipelineController::new(PipelineConfig::default()).unwrap();
        let (tx, rx) = command_channel();

        tx.send(ControlCommand::ApplyPreset("loud".to_string())).unwrap();
        tx.send(ControlCommand::Toggle("dog_bark".to_string())).unwrap();
        tx.send(ControlCommand::SetVolume(0.3)).unwrap();

        let report = controller.drain(&rx);
        assert_eq!(report.handled, 3);
        let names: Vec<&str> = report.errors.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["apply_preset", "toggle"]);
        assert_eq!(controller.volume(), 0.3);
        assert_eq!(controller.active_preset().id, "clarity");
    }

    #[test]
    fn test_command_json_shape() {
        let command = ControlCommand::SetAmplifyQuiet(8);
        let json = serde_json::to_string(&command).unwrap();
        assert_eq!(json, r#"{"type":"set_amplify_quiet","value":8}"#);
        let back: ControlCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, command);
    }

    #[test]
    fn test_suppress_json_rejects_invalid_band() {
        let (mut controller, _processor) = PipelineController::new(PipelineConfig::default()).unwrap();
        controller.assemble(&SourceHandle::new("a.wav", 48000, 1)).unwrap();

        for band in [
            r#"{"low_hz":1200.0,"high_hz":400.0}"#,
            r#"{"low_hz":0.0,"high_hz":0.0}"#,
            r#"{"low_hz":400.0,"high_hz":400.0}"#,
        ] {
            let json = format!(
                r#"{{"type":"suppress","value":{{"category":"dog_bark","band":{}}}}}"#,
                band
            );
            let err = serde_json::from_str::<ControlCommand>(&json).unwrap_err();
            assert!(err.to_string().contains("Invalid frequency band"), "{}", err);
        }

        let valid = r#"{"type":"suppress","value":{"category":"dog_bark","band":{"low_hz":400.0,"high_hz":1200.0}}}"#;
        controller.handle(serde_json::from_str(valid).unwrap()).unwrap();
        let notches = controller.notch_stages();
        assert_eq!(notches.len(), 1);
        assert!(notches[0].filter.unwrap().q > 0.5);
    }
}
