//! Filter graph assembly and serialization
//!
//! The assembler turns a `StageParameters` into a typed graph of filter
//! stages with labeled pins, validates pin discipline, and serializes it to
//! the engine's `-filter_complex` syntax. Stage order is fixed:
//! noise -> EQ -> multi-band compression -> tone touch-up -> de-esser ->
//! reverb -> stereo field -> loudness normalization -> limiter.

use crate::error::{MasterError, Result};
use crate::types::{CompressorBand, StageParameters};

/// Label of the engine's primary audio input stream.
pub const PRIMARY_INPUT: &str = "0:a";
/// Label of the graph's single terminal output, mapped into the output file.
pub const TERMINAL_OUTPUT: &str = "out";

/// One filter stage: a body consuming labeled input pins and producing
/// labeled output pins.
#[derive(Debug, Clone)]
pub struct GraphStage {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub body: String,
}

/// Ordered filter graph with pin discipline.
#[derive(Debug, Clone)]
pub struct FilterGraph {
    stages: Vec<GraphStage>,
}

impl FilterGraph {
    pub fn stages(&self) -> &[GraphStage] {
        &self.stages
    }

    /// Check pin discipline: every input pin is produced before use and
    /// consumed exactly once, every label is unique, and exactly one pin
    /// (the terminal) is left unconsumed.
    pub fn validate(&self) -> Result<()> {
        let mut available: Vec<String> = vec![PRIMARY_INPUT.to_string()];
        let mut seen: Vec<String> = vec![PRIMARY_INPUT.to_string()];

        for stage in &self.stages {
            for input in &stage.inputs {
                let Some(pos) = available.iter().position(|p| p == input) else {
                    return Err(MasterError::GraphContract(format!(
                        "input pin [{}] is not available for '{}'",
                        input, stage.body
                    )));
                };
                available.remove(pos);
            }
            for output in &stage.outputs {
                if seen.contains(output) {
                    return Err(MasterError::GraphContract(format!(
                        "duplicate pin label [{}]",
                        output
                    )));
                }
                seen.push(output.clone());
                available.push(output.clone());
            }
        }

        if available.len() != 1 || available[0] != TERMINAL_OUTPUT {
            return Err(MasterError::GraphContract(format!(
                "unconsumed pins {:?}; expected exactly [{}]",
                available, TERMINAL_OUTPUT
            )));
        }
        Ok(())
    }

    /// Serialize to `-filter_complex` text.
    ///
    /// The result contains no whitespace of any kind; the engine's graph
    /// parser treats stray spaces and newlines as syntax errors.
    pub fn serialize(&self) -> Result<String> {
        self.validate()?;
        let mut parts: Vec<String> = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let mut s = String::new();
            for input in &stage.inputs {
                s.push('[');
                s.push_str(input);
                s.push(']');
            }
            s.push_str(&stage.body);
            for output in &stage.outputs {
                s.push('[');
                s.push_str(output);
                s.push(']');
            }
            parts.push(s);
        }
        let text: String = parts.join(";").chars().filter(|c| !c.is_whitespace()).collect();
        Ok(text)
    }
}

/// Internal builder: tracks the current linear cursor pin and hands out
/// fresh labels.
struct Builder {
    stages: Vec<GraphStage>,
    cursor: String,
    next_label: usize,
}

impl Builder {
    fn new() -> Self {
        Self {
            stages: Vec::new(),
            cursor: PRIMARY_INPUT.to_string(),
            next_label: 0,
        }
    }

    fn fresh(&mut self, hint: &str) -> String {
        let label = format!("{}{}", hint, self.next_label);
        self.next_label += 1;
        label
    }

    /// Append a single-input single-output stage on the linear spine.
    fn linear(&mut self, body: String) {
        let out = self.fresh("a");
        self.stages.push(GraphStage {
            inputs: vec![self.cursor.clone()],
            outputs: vec![out.clone()],
            body,
        });
        self.cursor = out;
    }

    fn finish(mut self) -> FilterGraph {
        // relabel the final spine pin as the terminal
        if let Some(last) = self.stages.last_mut() {
            for output in &mut last.outputs {
                if *output == self.cursor {
                    *output = TERMINAL_OUTPUT.to_string();
                }
            }
        }
        FilterGraph { stages: self.stages }
    }
}

/// Assemble the full graph for one run.
///
/// Always produces a graph whose last stage is the limiter and whose
/// terminal pin is [`TERMINAL_OUTPUT`].
pub fn assemble(params: &StageParameters) -> Result<FilterGraph> {
    let mut b = Builder::new();

    // 1. noise suppression + rumble filter (always present)
    // the denoiser accepts floor values in -80..-20
    let nf = params.noise.strength_db.clamp(-80.0, -20.0);
    b.linear(format!(
        "afftdn=nf={}:nt=w,highpass=f={}",
        num(nf),
        params.noise.highpass_hz
    ));

    // 2. equalization
    if let Some(bands) = &params.eq {
        let body = bands
            .iter()
            .map(|band| {
                format!(
                    "equalizer=f={}:g={}:w={}",
                    num(band.frequency_hz),
                    num(band.gain_db),
                    num(band.width)
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        if !body.is_empty() {
            b.linear(body);
        }
    }

    // 3. multi-band compression: split, per-band chains, weighted recombine.
    // Band weights are encoded as per-branch volume stages so the mix body
    // stays whitespace-free.
    if let Some(mb) = &params.compression {
        let split_in = b.cursor.clone();
        let low = b.fresh("low");
        let mid = b.fresh("mid");
        let high = b.fresh("high");
        b.stages.push(GraphStage {
            inputs: vec![split_in],
            outputs: vec![low.clone(), mid.clone(), high.clone()],
            body: "asplit=3".to_string(),
        });

        let low_out = b.fresh("low");
        b.stages.push(GraphStage {
            inputs: vec![low],
            outputs: vec![low_out.clone()],
            body: format!(
                "lowpass=f={},{}",
                num(mb.crossover_low_hz),
                compressor_body(&mb.low)
            ),
        });
        let mid_out = b.fresh("mid");
        b.stages.push(GraphStage {
            inputs: vec![mid],
            outputs: vec![mid_out.clone()],
            body: format!(
                "highpass=f={},lowpass=f={},{}",
                num(mb.crossover_low_hz),
                num(mb.crossover_high_hz),
                compressor_body(&mb.mid)
            ),
        });
        let high_out = b.fresh("high");
        b.stages.push(GraphStage {
            inputs: vec![high],
            outputs: vec![high_out.clone()],
            body: format!(
                "highpass=f={},{}",
                num(mb.crossover_high_hz),
                compressor_body(&mb.high)
            ),
        });

        let mixed = b.fresh("a");
        b.stages.push(GraphStage {
            inputs: vec![low_out, mid_out, high_out],
            outputs: vec![mixed.clone()],
            body: "amix=inputs=3:normalize=0".to_string(),
        });
        b.cursor = mixed;
    }

    // 4. tone touch-up
    b.linear(format!(
        "equalizer=f={}:g={}:w={}",
        num(params.touchup.frequency_hz),
        num(params.touchup.gain_db),
        num(params.touchup.width)
    ));

    // 5. de-esser
    if let Some(de) = &params.de_esser {
        b.linear(format!(
            "deesser=i={}:m={}:f={}",
            num(de.intensity),
            num(de.amount),
            num(de.frequency)
        ));
    }

    // 6. parallel reverb: dry/wet split, filtered echo on the wet branch
    if let Some(rv) = &params.reverb {
        let split_in = b.cursor.clone();
        let dry = b.fresh("dry");
        let wet = b.fresh("wet");
        b.stages.push(GraphStage {
            inputs: vec![split_in],
            outputs: vec![dry.clone(), wet.clone()],
            body: "asplit=2".to_string(),
        });

        let delays = rv
            .delays_ms
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("|");
        let decays = rv
            .decays
            .iter()
            .map(|d| num(*d))
            .collect::<Vec<_>>()
            .join("|");
        let wet_out = b.fresh("wet");
        b.stages.push(GraphStage {
            inputs: vec![wet],
            outputs: vec![wet_out.clone()],
            body: format!(
                "aecho=0.6:0.4:{}:{},highpass=f={},lowpass=f={},volume={}",
                delays, decays, rv.highpass_hz, rv.lowpass_hz, num(rv.wet_level)
            ),
        });

        let mixed = b.fresh("a");
        b.stages.push(GraphStage {
            inputs: vec![dry, wet_out],
            outputs: vec![mixed.clone()],
            body: "amix=inputs=2:normalize=0".to_string(),
        });
        b.cursor = mixed;
    }

    // 7. stereo field
    let mut stereo_body = format!(
        "pan=stereo|c0={}*c0+{}*c1|c1={}*c0+{}*c1",
        num(params.stereo.ll),
        num(params.stereo.lr),
        num(params.stereo.rl),
        num(params.stereo.rr)
    );
    if params.stereo.left_delay_ms > 0 {
        stereo_body.push_str(&format!(",adelay={}|0", params.stereo.left_delay_ms));
    }
    b.linear(stereo_body);

    // 8. single-pass loudness normalization seeded with measured values
    let ln = &params.loudnorm;
    b.linear(format!(
        "loudnorm=I={}:LRA={}:TP={}:measured_I={}:measured_LRA={}:measured_TP={}",
        num(ln.target_lufs),
        num(ln.target_lra),
        num(ln.true_peak_db),
        num(ln.measured_lufs),
        num(ln.measured_lra),
        num(ln.measured_true_peak_db)
    ));

    // 9. safety limiter, always last
    b.linear(format!(
        "alimiter=level_in=1:level_out=1:limit={}:attack={}:release={}:asc=0",
        num(params.limiter.limit),
        num(params.limiter.attack_ms),
        num(params.limiter.release_ms)
    ));

    let graph = b.finish();
    graph.validate()?;
    Ok(graph)
}

fn compressor_body(band: &CompressorBand) -> String {
    format!(
        "acompressor=threshold={}dB:ratio={}:attack={}:release={}:knee={}dB:makeup={}dB,volume={}",
        num(band.threshold_db),
        num(band.ratio),
        num(band.attack_ms),
        num(band.release_ms),
        num(band.knee_db),
        num(band.makeup_db),
        num(band.mix_weight)
    )
}

/// Shortest decimal form: `2.0` prints as `2`, `0.707` stays `0.707`.
fn num(v: f64) -> String {
    format!("{}", v)
}
