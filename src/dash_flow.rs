//! The dash (tip) payment flow.
//!
//! A linear flow rather than a full state machine: open → fetch presets →
//! pick a preset or type a custom amount → optional message → submit. On
//! success the shell navigates to the externally hosted payment page; the
//! outcome only comes back later through the redirect contract parsed by
//! [`PaymentOutcome`](crate::dashes::PaymentOutcome). A failed submit keeps
//! the flow open for retry with an inline error.

use crate::api::{ApiClient, PaymentInit};
use crate::dashes::{DashPreset, PaymentOutcome, clamp_message, custom_amount_to_minor};
use crate::moments::Moment;
use crate::types::Currency;

#[derive(Debug)]
pub struct DashFlow {
    moment: Option<Moment>,
    presets: Vec<DashPreset>,
    currency: Currency,
    selected_amount: Option<i64>,
    custom_input: String,
    message: String,
    is_submitting: bool,
    error: Option<String>,
}

impl DashFlow {
    pub fn new() -> Self {
        Self {
            moment: None,
            presets: Vec::new(),
            currency: Currency::Ngn,
            selected_amount: None,
            custom_input: String::new(),
            message: String::new(),
            is_submitting: false,
            error: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.moment.is_some()
    }

    pub fn moment(&self) -> Option<&Moment> {
        self.moment.as_ref()
    }

    pub fn presets(&self) -> &[DashPreset] {
        &self.presets
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Currently selected amount in minor units.
    pub fn selected_amount(&self) -> Option<i64> {
        self.selected_amount
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Opens the flow for a moment, clearing any previous selection.
    pub fn open(&mut self, moment: Moment) {
        self.moment = Some(moment);
        self.presets.clear();
        self.selected_amount = None;
        self.custom_input.clear();
        self.message.clear();
        self.is_submitting = false;
        self.error = None;
    }

    pub fn close(&mut self) {
        self.moment = None;
        self.presets.clear();
        self.selected_amount = None;
        self.custom_input.clear();
        self.message.clear();
        self.is_submitting = false;
        self.error = None;
    }

    /// Fetches preset amounts and currency; the first preset is
    /// pre-selected.
    pub async fn load_presets(&mut self, api: &ApiClient) -> crate::api::Result<()> {
        let presets = api.dash_presets().await?;
        self.currency = presets.currency;
        self.presets = presets.presets;
        if let Some(first) = self.presets.first() {
            self.selected_amount = Some(first.amount);
        }
        self.custom_input.clear();
        Ok(())
    }

    /// Selects a preset amount (minor units) and clears the custom input.
    pub fn select_preset(&mut self, amount: i64) {
        self.selected_amount = Some(amount);
        self.custom_input.clear();
    }

    /// Records a custom major-unit amount input. Non-numeric input clears
    /// the selection.
    pub fn set_custom_amount(&mut self, input: &str) {
        self.custom_input = input.to_string();
        self.selected_amount = custom_amount_to_minor(input, self.currency);
    }

    pub fn custom_input(&self) -> &str {
        &self.custom_input
    }

    /// Stores the optional message, capped at 200 characters.
    pub fn set_message(&mut self, message: &str) {
        self.message = clamp_message(message).to_string();
    }

    /// Submits the dash. On success the returned `payment_url` is for a
    /// full-page navigation; on failure the error is stored inline and the
    /// flow stays open for retry. Returns `Ok(None)` when there is nothing
    /// to submit (no open moment or no amount), or while a submit is
    /// already running.
    pub async fn submit(&mut self, api: &ApiClient) -> crate::api::Result<Option<PaymentInit>> {
        let (Some(moment_id), Some(amount)) = (
            self.moment.as_ref().map(|m| m.id.clone()),
            self.selected_amount,
        ) else {
            return Ok(None);
        };
        if self.is_submitting {
            return Ok(None);
        }

        self.is_submitting = true;
        self.error = None;

        let message = if self.message.is_empty() {
            None
        } else {
            Some(self.message.as_str())
        };

        let result = api
            .initialize_dash_payment(&moment_id, amount, message)
            .await;
        self.is_submitting = false;

        match result {
            Ok(init) => Ok(Some(init)),
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

impl Default for DashFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Pulse animation state for the dash button.
///
/// The celebratory pulse is driven by explicit status transitions instead of
/// the click handler alone: a click moves the button to `Submitted`, and the
/// pulse only fires once the payment outcome is confirmed via the redirect,
/// so a payment that subsequently fails never flashes success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashPulse {
    #[default]
    Idle,
    Submitted,
    Confirmed,
}

#[derive(Debug, Default)]
pub struct DashButtonState {
    pulse: DashPulse,
}

impl DashButtonState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulse(&self) -> DashPulse {
        self.pulse
    }

    /// `true` only while the confirmed pulse animation should play.
    pub fn pulse_active(&self) -> bool {
        self.pulse == DashPulse::Confirmed
    }

    /// The user submitted a dash; the outcome is not yet known.
    pub fn submitted(&mut self) {
        if self.pulse == DashPulse::Idle {
            self.pulse = DashPulse::Submitted;
        }
    }

    /// The redirect reported success.
    pub fn confirmed(&mut self) {
        if self.pulse == DashPulse::Submitted {
            self.pulse = DashPulse::Confirmed;
        }
    }

    /// The redirect reported failure; back to rest without a pulse.
    pub fn failed(&mut self) {
        if self.pulse == DashPulse::Submitted {
            self.pulse = DashPulse::Idle;
        }
    }

    /// Feeds the parsed redirect outcome into the pulse state.
    pub fn apply_outcome(&mut self, outcome: &PaymentOutcome) {
        match outcome {
            PaymentOutcome::Success { .. } => self.confirmed(),
            PaymentOutcome::Failure(_) => self.failed(),
        }
    }

    /// Returns to rest after the pulse animation played.
    pub fn reset(&mut self) {
        self.pulse = DashPulse::Idle;
    }
}
