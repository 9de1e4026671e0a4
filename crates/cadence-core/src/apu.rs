use std::collections::VecDeque;

use crate::clock::{CLOCKS_NEVER, ClockCounter, Reconcile, clocks_to_falling_edge};

/// Stereo samples per second produced into the snapshot buffer.
pub const SAMPLE_RATE: u32 = 32_768;
/// CPU clocks per output sample at normal speed.
const CLOCKS_PER_SAMPLE: i32 = 128;
/// Keep at most half a second of unread samples.
const MAX_BUFFERED_SAMPLES: usize = SAMPLE_RATE as usize / 2;
/// Divider bit whose falling edge steps the frame sequencer (one higher in
/// double speed so the sequencer stays at 512 Hz).
const FRAME_SEQUENCER_BIT: u32 = 12;

const POWER_ON_REGS: [u8; 0x20] = [
    0x80, 0xBF, 0xF3, 0xFF, 0xBF, 0xFF, 0x3F, 0x00, 0xFF, 0xBF, 0x7F, 0xFF, 0x9F, 0xFF, 0xBF, 0xFF,
    0xFF, 0x00, 0x00, 0xBF, 0x77, 0xF3, 0xF1, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

/// Channel state handed to the synthesizer for each output sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoiceState {
    /// Channel is running and its DAC is on.
    pub active: [bool; 4],
    /// Envelope volume for channels 1, 2 and 4; channel 3's output level
    /// code (0-3) in slot 2.
    pub volume: [u8; 4],
    /// 11-bit period registers for channels 1-3, NR43 for channel 4.
    pub frequency: [u16; 4],
    pub duty: [u8; 2],
    pub nr50: u8,
    pub nr51: u8,
    pub double_speed: bool,
}

/// PCM synthesis collaborator.
pub trait SoundSynth: Send {
    /// Produce one stereo sample. `wave_ram` is channel 3's pattern memory.
    fn sample(&mut self, voices: &VoiceState, wave_ram: &[u8; 16]) -> [i16; 2];
}

/// Emits silence at the output rate.
#[derive(Default)]
pub struct SilentSynth;

impl SoundSynth for SilentSynth {
    fn sample(&mut self, _voices: &VoiceState, _wave_ram: &[u8; 16]) -> [i16; 2] {
        [0, 0]
    }
}

#[derive(Default, Clone, Copy, Debug)]
struct Envelope {
    initial: u8,
    period: u8,
    add: bool,
    volume: u8,
    timer: u8,
}

impl Envelope {
    fn clock(&mut self) {
        if self.period == 0 {
            return;
        }
        if self.timer > 0 {
            self.timer -= 1;
        }
        if self.timer == 0 {
            self.timer = self.period;
            if self.add && self.volume < 15 {
                self.volume += 1;
            } else if !self.add && self.volume > 0 {
                self.volume -= 1;
            }
        }
    }

    fn reload(&mut self, nrx2: u8) {
        self.initial = nrx2 >> 4;
        self.volume = self.initial;
        self.period = nrx2 & 0x07;
        self.add = nrx2 & 0x08 != 0;
        self.timer = self.period;
    }
}

#[derive(Default, Clone, Copy, Debug)]
struct Sweep {
    period: u8,
    negate: bool,
    shift: u8,
    timer: u8,
    shadow: u16,
    enabled: bool,
    /// A subtraction has been computed since the last trigger.
    neg_used: bool,
}

impl Sweep {
    fn calculate(&mut self) -> u16 {
        let delta = self.shadow >> self.shift;
        if self.negate {
            self.neg_used = true;
            self.shadow.wrapping_sub(delta)
        } else {
            self.shadow + delta
        }
    }

    /// Returns true when clearing negate after a subtraction disables the
    /// channel.
    fn write(&mut self, val: u8) -> bool {
        let was_negate = self.negate;
        self.period = (val >> 4) & 0x07;
        self.negate = val & 0x08 != 0;
        self.shift = val & 0x07;
        was_negate && !self.negate && self.neg_used
    }

    fn reload(&mut self, freq: u16) {
        self.shadow = freq;
        self.timer = if self.period == 0 { 8 } else { self.period };
        self.enabled = self.period != 0 || self.shift != 0;
        self.neg_used = false;
    }
}

#[derive(Default, Clone, Copy, Debug)]
struct Channel {
    enabled: bool,
    dac_enabled: bool,
    length: u16,
    length_enable: bool,
    envelope: Envelope,
}

impl Channel {
    fn clock_length(&mut self) {
        if self.length_enable && self.length > 0 {
            self.length -= 1;
            if self.length == 0 {
                self.enabled = false;
            }
        }
    }

    fn active(&self) -> bool {
        self.enabled && self.dac_enabled
    }
}

/// Sound registers and the time-driven parts of the four channels.
///
/// Waveform generation is delegated to a `SoundSynth`; this unit owns the
/// frame sequencer (length, sweep, envelope) and the output sample buffer.
pub struct Apu {
    clock: ClockCounter,
    regs: [u8; 0x20],
    wave_ram: [u8; 0x10],
    channels: [Channel; 4],
    sweep: Sweep,
    powered: bool,
    sequencer_step: u8,
    clocks_to_next_step: i32,
    clocks_to_next_sample: i32,
    double_speed: bool,
    cgb: bool,
    samples: VecDeque<[i16; 2]>,
    synth: Box<dyn SoundSynth + Send>,
}

impl Apu {
    pub fn new(cgb: bool) -> Self {
        Self {
            clock: ClockCounter::new(),
            regs: POWER_ON_REGS,
            wave_ram: [0; 0x10],
            channels: [Channel::default(); 4],
            sweep: Sweep::default(),
            powered: true,
            sequencer_step: 0,
            clocks_to_next_step: 1 << (FRAME_SEQUENCER_BIT + 1),
            clocks_to_next_sample: CLOCKS_PER_SAMPLE,
            double_speed: false,
            cgb,
            samples: VecDeque::with_capacity(MAX_BUFFERED_SAMPLES),
            synth: Box::new(SilentSynth),
        }
    }

    pub fn set_synth(&mut self, synth: Box<dyn SoundSynth + Send>) {
        self.synth = synth;
    }

    #[inline]
    fn sequencer_bit(&self) -> u32 {
        FRAME_SEQUENCER_BIT + u32::from(self.double_speed)
    }

    /// Phase the frame sequencer against the system counter.
    pub fn align_to_divider(&mut self, sys_clocks: u16) {
        self.clocks_to_next_step = clocks_to_falling_edge(sys_clocks, self.sequencer_bit());
    }

    pub fn set_double_speed(&mut self, enabled: bool, sys_clocks: u16) {
        self.double_speed = enabled;
        self.align_to_divider(sys_clocks);
    }

    /// A DIV write clears the system counter; a high sequencer bit at that
    /// moment is a falling edge and steps the sequencer once.
    pub fn on_divider_reset(&mut self, old_sys_clocks: u16) {
        if self.powered && (old_sys_clocks >> self.sequencer_bit()) & 1 != 0 {
            self.step_frame_sequencer();
        }
        self.align_to_divider(0);
    }

    pub fn powered(&self) -> bool {
        self.powered
    }

    /// Rebuild the preset register state left by the boot ROM.
    pub fn apply_boot_state(&mut self) {
        self.regs = POWER_ON_REGS;
        self.powered = true;
        self.channels = [Channel::default(); 4];
        self.channels[0].enabled = true;
        self.channels[0].dac_enabled = true;
        self.channels[1].dac_enabled = true;
        self.channels[3].dac_enabled = true;
        self.channels[0].envelope.reload(self.regs[0x02]);
        self.sweep.write(self.regs[0x00]);
    }

    fn step_frame_sequencer(&mut self) {
        let step = self.sequencer_step;
        self.sequencer_step = (self.sequencer_step + 1) & 7;
        if step % 2 == 0 {
            for ch in &mut self.channels {
                ch.clock_length();
            }
        }
        if step == 2 || step == 6 {
            self.clock_sweep();
        }
        if step == 7 {
            for idx in [0, 1, 3] {
                if self.channels[idx].enabled {
                    self.channels[idx].envelope.clock();
                }
            }
        }
    }

    fn clock_sweep(&mut self) {
        if !self.sweep.enabled {
            return;
        }
        if self.sweep.timer > 0 {
            self.sweep.timer -= 1;
        }
        if self.sweep.timer != 0 {
            return;
        }
        self.sweep.timer = if self.sweep.period == 0 { 8 } else { self.sweep.period };
        if self.sweep.period == 0 {
            return;
        }
        let new_freq = self.sweep.calculate();
        if new_freq > 2047 {
            self.channels[0].enabled = false;
            return;
        }
        if self.sweep.shift != 0 {
            self.sweep.shadow = new_freq;
            self.set_frequency(0, new_freq);
            if self.sweep.calculate() > 2047 {
                self.channels[0].enabled = false;
            }
        }
    }

    fn frequency(&self, idx: usize) -> u16 {
        let base = idx * 5;
        u16::from(self.regs[base + 3]) | (u16::from(self.regs[base + 4] & 0x07) << 8)
    }

    fn set_frequency(&mut self, idx: usize, freq: u16) {
        let base = idx * 5;
        self.regs[base + 3] = freq as u8;
        self.regs[base + 4] = (self.regs[base + 4] & !0x07) | ((freq >> 8) as u8 & 0x07);
    }

    fn length_max(idx: usize) -> u16 {
        if idx == 2 { 256 } else { 64 }
    }

    fn trigger(&mut self, idx: usize) {
        let ch = &mut self.channels[idx];
        ch.enabled = ch.dac_enabled;
        if ch.length == 0 {
            ch.length = Self::length_max(idx);
            // Reloading a zero length with length enabled during the first
            // half of a sequencer period eats one extra clock.
            if ch.length_enable && self.sequencer_step % 2 == 1 {
                ch.length -= 1;
            }
        }
        if idx != 2 {
            let nrx2 = self.regs[idx * 5 + 2];
            self.channels[idx].envelope.reload(nrx2);
        }
        if idx == 0 {
            let freq = self.frequency(0);
            self.sweep.reload(freq);
            if self.sweep.shift != 0 && self.sweep.calculate() > 2047 {
                self.channels[0].enabled = false;
            }
        }
    }

    fn write_length_control(&mut self, idx: usize, val: u8) {
        let was_enabled = self.channels[idx].length_enable;
        let ch = &mut self.channels[idx];
        ch.length_enable = val & 0x40 != 0;
        // Enabling length while the next sequencer step does not clock
        // lengths clocks it once right away.
        if !was_enabled && ch.length_enable && self.sequencer_step % 2 == 1 && ch.length > 0 {
            ch.length -= 1;
            if ch.length == 0 && val & 0x80 == 0 {
                ch.enabled = false;
            }
        }
        if val & 0x80 != 0 {
            self.trigger(idx);
        }
    }

    fn power_off(&mut self) {
        for reg in &mut self.regs[..0x16] {
            *reg = 0;
        }
        let lengths: Vec<u16> = self.channels.iter().map(|ch| ch.length).collect();
        self.channels = [Channel::default(); 4];
        if !self.cgb {
            // DMG keeps length counters while powered off.
            for (ch, len) in self.channels.iter_mut().zip(lengths) {
                ch.length = len;
            }
        }
        self.sweep = Sweep::default();
        self.powered = false;
    }

    fn read_mask(addr: u16) -> u8 {
        match addr {
            0xFF10 => 0x80,
            0xFF11 | 0xFF16 => 0x3F,
            0xFF12 | 0xFF17 | 0xFF21 | 0xFF22 | 0xFF24 | 0xFF25 => 0x00,
            0xFF14 | 0xFF19 | 0xFF1E | 0xFF23 => 0xBF,
            0xFF1A => 0x7F,
            0xFF1C => 0x9F,
            0xFF26 => 0x70,
            _ => 0xFF,
        }
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF26 => {
                let mut val = if self.powered { 0x80 } else { 0 };
                for (i, ch) in self.channels.iter().enumerate() {
                    if ch.enabled {
                        val |= 1 << i;
                    }
                }
                val | Self::read_mask(addr)
            }
            0xFF30..=0xFF3F => {
                if self.channels[2].active() {
                    0xFF
                } else {
                    self.wave_ram[usize::from(addr - 0xFF30)]
                }
            }
            0xFF10..=0xFF25 => self.regs[usize::from(addr - 0xFF10)] | Self::read_mask(addr),
            _ => 0xFF,
        }
    }

    /// CGB PCM12/PCM34. Envelope volumes of the running channels stand in
    /// for the instantaneous digital outputs.
    pub fn read_pcm(&self, addr: u16) -> u8 {
        if !self.cgb {
            return 0xFF;
        }
        let level = |idx: usize| -> u8 {
            let ch = &self.channels[idx];
            if !ch.active() {
                0
            } else if idx == 2 {
                match (self.regs[0x0C] >> 5) & 0x03 {
                    0 => 0,
                    code => 0x0F >> (code - 1),
                }
            } else {
                ch.envelope.volume
            }
        };
        match addr {
            0xFF76 => level(0) | (level(1) << 4),
            0xFF77 => level(2) | (level(3) << 4),
            _ => 0xFF,
        }
    }

    /// Register write at the unit's current clock. The caller reconciles
    /// first.
    pub fn write_reg(&mut self, addr: u16, val: u8) {
        if let 0xFF30..=0xFF3F = addr {
            if !self.channels[2].active() {
                self.wave_ram[usize::from(addr - 0xFF30)] = val;
            }
            return;
        }
        if addr == 0xFF26 {
            let on = val & 0x80 != 0;
            if self.powered && !on {
                self.power_off();
            } else if !self.powered && on {
                self.powered = true;
                self.sequencer_step = 0;
            }
            return;
        }
        if !(0xFF10..=0xFF25).contains(&addr) {
            return;
        }
        if !self.powered {
            // DMG still accepts length writes while powered off.
            if !self.cgb {
                match addr {
                    0xFF11 | 0xFF16 | 0xFF20 => {
                        let idx = usize::from((addr - 0xFF11) / 5);
                        self.channels[idx].length = 64 - u16::from(val & 0x3F);
                    }
                    0xFF1B => self.channels[2].length = 256 - u16::from(val),
                    _ => {}
                }
            }
            return;
        }

        let idx = usize::from(addr - 0xFF10);
        self.regs[idx] = val;
        match addr {
            0xFF10 => {
                if self.sweep.write(val) {
                    self.channels[0].enabled = false;
                }
            }
            0xFF11 | 0xFF16 | 0xFF20 => {
                let ch = usize::from((addr - 0xFF11) / 5);
                self.channels[ch].length = 64 - u16::from(val & 0x3F);
            }
            0xFF1B => self.channels[2].length = 256 - u16::from(val),
            0xFF12 | 0xFF17 | 0xFF21 => {
                let ch = &mut self.channels[usize::from((addr - 0xFF12) / 5)];
                ch.dac_enabled = val & 0xF8 != 0;
                if !ch.dac_enabled {
                    ch.enabled = false;
                }
            }
            0xFF1A => {
                let ch = &mut self.channels[2];
                ch.dac_enabled = val & 0x80 != 0;
                if !ch.dac_enabled {
                    ch.enabled = false;
                }
            }
            0xFF14 | 0xFF19 | 0xFF1E | 0xFF23 => {
                self.write_length_control(usize::from((addr - 0xFF14) / 5), val);
            }
            _ => {}
        }
    }

    fn voices(&self) -> VoiceState {
        let mut voices = VoiceState {
            nr50: self.regs[0x14],
            nr51: self.regs[0x15],
            double_speed: self.double_speed,
            ..VoiceState::default()
        };
        for (i, ch) in self.channels.iter().enumerate() {
            voices.active[i] = self.powered && ch.active();
            voices.volume[i] = if i == 2 {
                (self.regs[0x0C] >> 5) & 0x03
            } else {
                ch.envelope.volume
            };
        }
        voices.frequency = [
            self.frequency(0),
            self.frequency(1),
            self.frequency(2),
            u16::from(self.regs[0x12]),
        ];
        voices.duty = [self.regs[0x01] >> 6, self.regs[0x06] >> 6];
        voices
    }

    fn clocks_per_sample(&self) -> i32 {
        CLOCKS_PER_SAMPLE << u32::from(self.double_speed)
    }

    fn push_sample(&mut self) {
        let voices = self.voices();
        let sample = self.synth.sample(&voices, &self.wave_ram);
        if self.samples.len() >= MAX_BUFFERED_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Copy out and clear the buffered samples. The live buffer never leaves
    /// the unit.
    pub fn samples_frame(&mut self) -> Vec<[i16; 2]> {
        self.samples.drain(..).collect()
    }

    pub fn buffered_samples(&self) -> usize {
        self.samples.len()
    }

    /// Channel enable bits as NR52 reports them.
    pub fn channel_status(&self) -> u8 {
        self.read_reg(0xFF26) & 0x0F
    }
}

impl Reconcile<()> for Apu {
    fn reset(&mut self) {
        let synth = std::mem::replace(&mut self.synth, Box::new(SilentSynth));
        *self = Self::new(self.cgb);
        self.synth = synth;
    }

    fn update_clocks_counter_reference(&mut self, reference: i32, _ctx: &mut ()) {
        // A stale reference is ignored here rather than asserted.
        let mut remaining = self.clock.advance_to_lenient(reference);
        while remaining > 0 {
            let step = remaining
                .min(self.clocks_to_next_step)
                .min(self.clocks_to_next_sample);
            remaining -= step;
            self.clocks_to_next_step -= step;
            self.clocks_to_next_sample -= step;
            if self.clocks_to_next_step == 0 {
                self.clocks_to_next_step = 1 << (self.sequencer_bit() + 1);
                if self.powered {
                    self.step_frame_sequencer();
                }
            }
            if self.clocks_to_next_sample == 0 {
                self.clocks_to_next_sample = self.clocks_per_sample();
                self.push_sample();
            }
        }
    }

    fn clocks_to_next_event(&self) -> i32 {
        if self.powered && self.channels.iter().any(|ch| ch.enabled) {
            self.clocks_to_next_step
        } else {
            CLOCKS_NEVER
        }
    }

    fn clock_counter(&self) -> i32 {
        self.clock.get()
    }

    fn clock_counter_reset(&mut self) {
        self.clock.reset();
    }
}
