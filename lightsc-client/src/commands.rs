//! lightsd methods as typed calls
//!
//! Each method here only marshals its arguments into the parameter shape
//! lightsd expects and goes through [`LightsClient::call`], so all of them
//! are queued when a batch is open. The exceptions are
//! [`LightsClient::get_light_states`] and [`LightsClient::adjust_brightness`],
//! which need a result before they can finish and refuse to run in a batch.

use crate::batch::Outcome;
use crate::client::{Call, LightsClient};
use crate::light::{Hsbk, LightState, Target, Waveform};
use crate::transport::Transport;
use lightsc_core::{Error, Result};
use serde_json::{json, Value};

/// Transition used by [`LightsClient::adjust_brightness`]
pub const BRIGHTNESS_TRANSITION_MS: u32 = 500;

/// Skew ratio of saw and half-sine waves, and the usual peak or duty cycle
/// for the others
pub const DEFAULT_SKEW_RATIO: f64 = 0.5;

impl<T: Transport> LightsClient<T> {
    /// Fade `target` to a color over `duration_ms`
    pub async fn set_light_from_hsbk(
        &mut self,
        target: impl Into<Target>,
        hue: f64,
        saturation: f64,
        brightness: f64,
        kelvin: u16,
        duration_ms: u32,
    ) -> Result<Call> {
        let target: Target = target.into();
        let params = json!([target, hue, saturation, brightness, kelvin, duration_ms]);
        self.call("set_light_from_hsbk", params).await
    }

    /// Play a waveform on `target`
    ///
    /// `skew_ratio` shapes the wave (peak position for sine and triangle,
    /// duty cycle for square). A `transient` waveform returns the bulbs to
    /// their original color when it ends.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_waveform(
        &mut self,
        target: impl Into<Target>,
        waveform: Waveform,
        color: Hsbk,
        period_ms: u32,
        cycles: f64,
        skew_ratio: f64,
        transient: bool,
    ) -> Result<Call> {
        let target: Target = target.into();
        let params = json!([
            target,
            waveform.as_str(),
            color.hue,
            color.saturation,
            color.brightness,
            color.kelvin,
            period_ms,
            cycles,
            skew_ratio,
            transient,
        ]);
        self.call("set_waveform", params).await
    }

    pub async fn saw(
        &mut self,
        target: impl Into<Target>,
        color: Hsbk,
        period_ms: u32,
        cycles: f64,
        transient: bool,
    ) -> Result<Call> {
        self.set_waveform(
            target,
            Waveform::Saw,
            color,
            period_ms,
            cycles,
            DEFAULT_SKEW_RATIO,
            transient,
        )
        .await
    }

    /// Sine wave peaking at `peak` (0.0 to 1.0) of each period
    pub async fn sine(
        &mut self,
        target: impl Into<Target>,
        color: Hsbk,
        period_ms: u32,
        cycles: f64,
        peak: f64,
        transient: bool,
    ) -> Result<Call> {
        self.set_waveform(target, Waveform::Sine, color, period_ms, cycles, peak, transient)
            .await
    }

    pub async fn half_sine(
        &mut self,
        target: impl Into<Target>,
        color: Hsbk,
        period_ms: u32,
        cycles: f64,
        transient: bool,
    ) -> Result<Call> {
        self.set_waveform(
            target,
            Waveform::HalfSine,
            color,
            period_ms,
            cycles,
            DEFAULT_SKEW_RATIO,
            transient,
        )
        .await
    }

    /// Triangle wave peaking at `peak` (0.0 to 1.0) of each period
    pub async fn triangle(
        &mut self,
        target: impl Into<Target>,
        color: Hsbk,
        period_ms: u32,
        cycles: f64,
        peak: f64,
        transient: bool,
    ) -> Result<Call> {
        self.set_waveform(target, Waveform::Triangle, color, period_ms, cycles, peak, transient)
            .await
    }

    /// Square wave spending `duty_cycle` (0.0 to 1.0) of each period on `color`
    pub async fn square(
        &mut self,
        target: impl Into<Target>,
        color: Hsbk,
        period_ms: u32,
        cycles: f64,
        duty_cycle: f64,
        transient: bool,
    ) -> Result<Call> {
        self.set_waveform(target, Waveform::Square, color, period_ms, cycles, duty_cycle, transient)
            .await
    }

    pub async fn power_on(&mut self, target: impl Into<Target>) -> Result<Call> {
        let target: Target = target.into();
        self.call("power_on", json!({ "target": target })).await
    }

    pub async fn power_off(&mut self, target: impl Into<Target>) -> Result<Call> {
        let target: Target = target.into();
        self.call("power_off", json!({ "target": target })).await
    }

    pub async fn power_toggle(&mut self, target: impl Into<Target>) -> Result<Call> {
        let target: Target = target.into();
        self.call("power_toggle", json!({ "target": target })).await
    }

    /// Raw `get_light_state` call; the result is a list of bulb objects
    pub async fn get_light_state(&mut self, target: impl Into<Target>) -> Result<Call> {
        let target: Target = target.into();
        self.call("get_light_state", json!([target])).await
    }

    /// State of every bulb matched by `target`, decoded
    ///
    /// # Errors
    ///
    /// `Error::State` inside a batch; `Error::Serialization` if lightsd
    /// reports bulbs in an unexpected shape.
    pub async fn get_light_states(&mut self, target: impl Into<Target>) -> Result<Vec<LightState>> {
        let target: Target = target.into();
        self.request("get_light_state", json!([target])).await
    }

    /// Add `tag` to every bulb matched by `target`
    pub async fn tag(&mut self, target: impl Into<Target>, tag: &str) -> Result<Call> {
        let target: Target = target.into();
        self.call("tag", json!([target, tag])).await
    }

    /// Remove `tag` from every bulb matched by `target`
    pub async fn untag(&mut self, target: impl Into<Target>, tag: &str) -> Result<Call> {
        let target: Target = target.into();
        self.call("untag", json!([target, tag])).await
    }

    pub async fn set_label(&mut self, target: impl Into<Target>, label: &str) -> Result<Call> {
        let target: Target = target.into();
        self.call("set_label", json!([target, label])).await
    }

    /// Shift the brightness of every bulb matched by `target` by `delta`
    ///
    /// Reads the current state, then sends one `set_light_from_hsbk` per
    /// bulb (addressed by label) with brightness clamped to `0.0..=1.0` and
    /// a 500 ms transition. Hue, saturation and kelvin are kept.
    ///
    /// Returns the outcome of each `set_light_from_hsbk`, in the order lightsd
    /// listed the bulbs. A bulb the server refuses gets its error in the list
    /// and the remaining bulbs are still written.
    ///
    /// # Errors
    ///
    /// - `Error::State` inside a batch, since the new value depends on a read
    /// - any error from reading the state
    /// - `Error::Connection`, `Error::Timeout` or `Error::MalformedResponse`
    ///   from a write; later bulbs are left untouched
    #[tracing::instrument(skip(self, target), fields(target = tracing::field::Empty))]
    pub async fn adjust_brightness(
        &mut self,
        target: impl Into<Target>,
        delta: f64,
    ) -> Result<Vec<Outcome>> {
        let target: Target = target.into();
        tracing::Span::current().record("target", tracing::field::display(&target));

        if self.is_batching() {
            return Err(Error::State(
                "adjust_brightness reads state and cannot run inside a batch".to_string(),
            ));
        }

        let bulbs = self.get_light_states(target).await?;
        let mut results = Vec::with_capacity(bulbs.len());

        for bulb in bulbs {
            let color = bulb.hsbk.with_brightness_delta(delta);
            tracing::debug!(
                label = %bulb.label,
                from = bulb.hsbk.brightness,
                to = color.brightness,
                "Adjusting brightness"
            );

            let written = self
                .set_light_from_hsbk(
                    bulb.label.as_str(),
                    color.hue,
                    color.saturation,
                    color.brightness,
                    color.kelvin,
                    BRIGHTNESS_TRANSITION_MS,
                )
                .await;

            results.push(match written {
                Ok(call) => Ok(call.into_value().unwrap_or(Value::Null)),
                Err(Error::Rpc(error)) => {
                    tracing::warn!(
                        label = %bulb.label,
                        error = %error,
                        "Bulb refused brightness change"
                    );
                    Err(error)
                }
                Err(e) => return Err(e),
            });
        }

        Ok(results)
    }
}
