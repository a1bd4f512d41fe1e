//! A side-effect handler that prints actions instead of performing them.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

use warden_contracts::{
    action::{Action, ActionEffect},
    error::{WardenError, WardenResult},
};
use warden_core::traits::SideEffectHandler;

/// Prints every action to stdout. A generator invocation without a
/// `generator` in its payload fails.
#[derive(Debug, Default)]
pub struct ConsoleHandler {
    handled: AtomicUsize,
}

impl ConsoleHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SideEffectHandler for ConsoleHandler {
    fn handle(&self, action: &Action) -> WardenResult<()> {
        match action.effect {
            ActionEffect::EmitMessage => {
                let message = action.payload["message"].as_str().unwrap_or("(no message)");
                println!("      -> message: {message}");
            }
            ActionEffect::InvokeExternalGenerator => {
                let generator = action.payload["generator"].as_str().unwrap_or_default();
                if generator.is_empty() {
                    return Err(WardenError::ActionDispatchFailed {
                        action_id: action.id.clone(),
                        reason: "no generator configured".to_string(),
                    });
                }
                println!("      -> would run generator: {generator}");
            }
            ActionEffect::RaiseStalenessAlert => {
                println!("      -> staleness alert: {}", action.payload);
            }
        }
        let count = self.handled.fetch_add(1, Ordering::Relaxed) + 1;
        info!(action_id = %action.id, handled = count, "demo handler ran action");
        Ok(())
    }
}
