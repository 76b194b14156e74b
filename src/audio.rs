//! Sound effects through the Web Audio API, plus a looping music track
//!
//! Every effect is a short sequence of synthesized tones, so the only audio
//! file is the background track.

#[cfg(target_arch = "wasm32")]
use web_sys::{AudioContext, AudioContextState, HtmlAudioElement, OscillatorType};

use crate::game::GameEvent;
#[cfg(target_arch = "wasm32")]
use crate::settings::Settings;

/// Background track, relative to the page
pub const MUSIC_SRC: &str = "audio/retro.mp3";
/// Music level before the master volume is applied
pub const MUSIC_GAIN: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEffect {
    /// Circle touched a wall
    WallHit,
    /// Player clicked the circle
    CircleHit,
    /// Round began
    RoundStart,
    /// Finished faster than the stored best
    NewRecord,
}

impl SoundEffect {
    /// Sound for a game event, if it has one
    pub fn for_event(event: &GameEvent) -> Option<Self> {
        match event {
            GameEvent::WallHit => Some(Self::WallHit),
            GameEvent::CircleHit => Some(Self::CircleHit),
            GameEvent::RoundStarted { .. } => Some(Self::RoundStart),
            GameEvent::RoundEnded {
                new_record: true, ..
            } => Some(Self::NewRecord),
            GameEvent::RoundEnded { .. } => None,
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn tones(self) -> &'static [Tone] {
        match self {
            Self::WallHit => WALL_HIT,
            Self::CircleHit => CIRCLE_HIT,
            Self::RoundStart => ROUND_START,
            Self::NewRecord => NEW_RECORD,
        }
    }
}

/// What the background track does in response to a game event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicCue {
    /// Rewind and play from the top
    Restart,
    /// Pause and rewind
    Stop,
}

impl MusicCue {
    pub fn for_event(event: &GameEvent) -> Option<Self> {
        match event {
            GameEvent::RoundStarted { .. } => Some(Self::Restart),
            GameEvent::RoundEnded { .. } => Some(Self::Stop),
            GameEvent::WallHit | GameEvent::CircleHit => None,
        }
    }
}

/// Music element volume for a master volume (already 0 when muted)
pub fn music_volume(master: f32) -> f64 {
    f64::from(MUSIC_GAIN * master.clamp(0.0, 1.0))
}

#[cfg(target_arch = "wasm32")]
const WALL_HIT: &[Tone] = &[Tone::new(520.0, 0.0, 0.06, 0.15, OscillatorType::Sine)];
#[cfg(target_arch = "wasm32")]
const CIRCLE_HIT: &[Tone] = &[
    Tone::new(880.0, 0.0, 0.08, 0.3, OscillatorType::Triangle),
    Tone::new(1320.0, 0.04, 0.1, 0.2, OscillatorType::Triangle),
];
#[cfg(target_arch = "wasm32")]
const ROUND_START: &[Tone] = &[Tone::new(330.0, 0.0, 0.12, 0.2, OscillatorType::Square)];
/// Rising arpeggio after the hit sound
#[cfg(target_arch = "wasm32")]
const NEW_RECORD: &[Tone] = &[
    Tone::new(660.0, 0.15, 0.2, 0.25, OscillatorType::Triangle),
    Tone::new(880.0, 0.25, 0.2, 0.25, OscillatorType::Triangle),
    Tone::new(1100.0, 0.35, 0.35, 0.25, OscillatorType::Triangle),
];

/// One oscillator burst with an exponential fade
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy)]
struct Tone {
    freq: f32,
    /// Seconds after the effect starts
    delay: f64,
    duration: f64,
    gain: f32,
    wave: OscillatorType,
}

#[cfg(target_arch = "wasm32")]
impl Tone {
    const fn new(freq: f32, delay: f64, duration: f64, gain: f32, wave: OscillatorType) -> Self {
        Self {
            freq,
            delay,
            duration,
            gain,
            wave,
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub struct AudioManager {
    ctx: Option<AudioContext>,
    music: Option<HtmlAudioElement>,
    /// Master volume, 0 when muted
    volume: f32,
}

#[cfg(target_arch = "wasm32")]
impl AudioManager {
    pub fn new(settings: &Settings) -> Self {
        // Fails outside a secure context
        let ctx = AudioContext::new().ok();
        if ctx.is_none() {
            log::warn!("Failed to create AudioContext - audio disabled");
        }
        let music = HtmlAudioElement::new_with_src(MUSIC_SRC).ok();
        match &music {
            Some(track) => track.set_loop(true),
            None => log::warn!("Failed to create music element - music disabled"),
        }
        let mut audio = Self {
            ctx,
            music,
            volume: 0.0,
        };
        audio.apply(settings);
        audio
    }

    /// Pick up changed mute/volume settings
    pub fn apply(&mut self, settings: &Settings) {
        self.volume = settings.effective_volume();
        if let Some(track) = &self.music {
            track.set_volume(music_volume(self.volume));
        }
    }

    /// Effect and music cue for a game event
    pub fn on_event(&self, event: &GameEvent) {
        if let Some(effect) = SoundEffect::for_event(event) {
            self.play(effect);
        }
        if let Some(cue) = MusicCue::for_event(event) {
            self.cue_music(cue);
        }
    }

    pub fn cue_music(&self, cue: MusicCue) {
        let Some(track) = &self.music else { return };
        track.set_current_time(0.0);
        match cue {
            // Rejected until the first user gesture, or when the file is missing
            MusicCue::Restart => {
                if track.play().is_err() {
                    log::debug!("Could not start music");
                }
            }
            MusicCue::Stop => {
                let _ = track.pause();
            }
        }
    }

    pub fn play(&self, effect: SoundEffect) {
        if self.volume <= 0.0 {
            return;
        }
        let Some(ctx) = &self.ctx else { return };

        // Browsers keep the context suspended until a user gesture
        if ctx.state() == AudioContextState::Suspended {
            let _ = ctx.resume();
        }

        let start = ctx.current_time();
        for tone in effect.tones() {
            if self.play_tone(ctx, start, tone).is_none() {
                log::debug!("Could not play {:?}", effect);
                return;
            }
        }
    }

    fn play_tone(&self, ctx: &AudioContext, start: f64, tone: &Tone) -> Option<()> {
        let osc = ctx.create_oscillator().ok()?;
        let gain = ctx.create_gain().ok()?;
        osc.set_type(tone.wave);
        osc.frequency().set_value(tone.freq);
        osc.connect_with_audio_node(&gain).ok()?;
        gain.connect_with_audio_node(&ctx.destination()).ok()?;

        let t = start + tone.delay;
        gain.gain().set_value_at_time(self.volume * tone.gain, t).ok()?;
        gain.gain()
            .exponential_ramp_to_value_at_time(0.01, t + tone.duration)
            .ok()?;
        osc.start_with_when(t).ok()?;
        osc.stop_with_when(t + tone.duration + 0.02).ok()?;
        Some(())
    }
}
