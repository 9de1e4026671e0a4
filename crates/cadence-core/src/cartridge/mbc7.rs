use super::{CartridgeMemory, Mapper, MapperKind};

/// 93LC56 organised as 128 16-bit words.
pub(super) const EEPROM_BYTES: usize = 0x100;
const EEPROM_WORDS: u8 = 0x80;

const ACCEL_CENTER: u16 = 0x81D0;
const ACCEL_RANGE: f32 = 0x70 as f32;
const ACCEL_ERASED: u16 = 0x8000;

const EEPROM_CS: u8 = 0x80;
const EEPROM_CLK: u8 = 0x40;
const EEPROM_DI: u8 = 0x02;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EepromState {
    Idle,
    ReceiveCommand,
    ReceiveAddress,
    ReceiveData,
    ShiftOut,
    /// A programming command is waiting for CS to rise.
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Program {
    Write(u8, u16),
    Erase(u8),
    WriteAll(u16),
    EraseAll,
}

/// Microwire serial EEPROM driven through the Ax8x register.
#[derive(Debug)]
struct Eeprom {
    state: EepromState,
    cs: bool,
    clk: bool,
    di: bool,
    data_out: bool,
    shift: u16,
    bits: u8,
    opcode: u8,
    address: u8,
    write_all: bool,
    write_enabled: bool,
    pending: Option<Program>,
}

impl Eeprom {
    fn new() -> Self {
        Self {
            state: EepromState::Idle,
            cs: false,
            clk: false,
            di: false,
            data_out: true,
            shift: 0,
            bits: 0,
            opcode: 0,
            address: 0,
            write_all: false,
            write_enabled: false,
            pending: None,
        }
    }

    fn read(&self) -> u8 {
        let mut out = u8::from(self.data_out);
        if self.cs {
            out |= EEPROM_CS;
        }
        if self.clk {
            out |= EEPROM_CLK;
        }
        if self.di {
            out |= EEPROM_DI;
        }
        out
    }

    fn write(&mut self, val: u8, mem: &mut CartridgeMemory) {
        let cs = val & EEPROM_CS != 0;
        let clk = val & EEPROM_CLK != 0;
        self.di = val & EEPROM_DI != 0;

        if cs && !self.cs {
            if self.state == EepromState::Done {
                self.commit(mem);
            }
            self.state = EepromState::Idle;
        } else if !cs && self.state != EepromState::Done {
            self.state = EepromState::Idle;
        }

        if cs && clk && !self.clk {
            self.clock_in(mem);
        }
        self.cs = cs;
        self.clk = clk;
    }

    fn shift_in(&mut self) {
        self.shift = (self.shift << 1) | u16::from(self.di);
        self.bits += 1;
    }

    fn clock_in(&mut self, mem: &CartridgeMemory) {
        match self.state {
            EepromState::Idle => {
                if self.di {
                    self.state = EepromState::ReceiveCommand;
                    self.shift = 0;
                    self.bits = 0;
                }
            }
            EepromState::ReceiveCommand => {
                self.shift_in();
                if self.bits == 2 {
                    self.opcode = self.shift as u8;
                    self.state = EepromState::ReceiveAddress;
                    self.shift = 0;
                    self.bits = 0;
                }
            }
            EepromState::ReceiveAddress => {
                self.shift_in();
                if self.bits == 8 {
                    self.address = self.shift as u8;
                    self.shift = 0;
                    self.bits = 0;
                    self.decode(mem);
                }
            }
            EepromState::ReceiveData => {
                self.shift_in();
                if self.bits == 16 {
                    self.pending = Some(if self.write_all {
                        Program::WriteAll(self.shift)
                    } else {
                        Program::Write(self.address, self.shift)
                    });
                    self.finish_command();
                }
            }
            EepromState::ShiftOut => {
                self.data_out = self.shift & 0x8000 != 0;
                self.shift <<= 1;
                self.bits += 1;
                if self.bits == 16 {
                    self.state = EepromState::Idle;
                }
            }
            EepromState::Done => {}
        }
    }

    fn decode(&mut self, mem: &CartridgeMemory) {
        let word = self.address & (EEPROM_WORDS - 1);
        match self.opcode {
            0b10 => {
                self.shift = read_word(mem, word);
                self.data_out = false;
                self.state = EepromState::ShiftOut;
            }
            0b01 => {
                self.write_all = false;
                self.state = EepromState::ReceiveData;
            }
            0b11 => {
                self.pending = Some(Program::Erase(word));
                self.finish_command();
            }
            _ => match self.address >> 6 {
                0b11 => {
                    self.write_enabled = true;
                    self.state = EepromState::Idle;
                }
                0b00 => {
                    self.write_enabled = false;
                    self.state = EepromState::Idle;
                }
                0b01 => {
                    self.write_all = true;
                    self.state = EepromState::ReceiveData;
                }
                _ => {
                    self.pending = Some(Program::EraseAll);
                    self.finish_command();
                }
            },
        }
    }

    fn finish_command(&mut self) {
        self.data_out = false;
        self.state = EepromState::Done;
    }

    fn commit(&mut self, mem: &mut CartridgeMemory) {
        let Some(program) = self.pending.take() else {
            return;
        };
        if self.write_enabled {
            match program {
                Program::Write(address, value) => {
                    write_word(mem, address & (EEPROM_WORDS - 1), value)
                }
                Program::Erase(address) => write_word(mem, address, 0xFFFF),
                Program::WriteAll(value) => {
                    (0..EEPROM_WORDS).for_each(|word| write_word(mem, word, value))
                }
                Program::EraseAll => (0..EEPROM_WORDS).for_each(|word| write_word(mem, word, 0xFFFF)),
            }
        }
        self.data_out = true;
    }
}

fn read_word(mem: &CartridgeMemory, word: u8) -> u16 {
    let offset = usize::from(word) * 2;
    u16::from_le_bytes([mem.ram_byte(offset), mem.ram_byte(offset + 1)])
}

fn write_word(mem: &mut CartridgeMemory, word: u8, value: u16) {
    let offset = usize::from(word) * 2;
    let [lo, hi] = value.to_le_bytes();
    mem.write_ram(offset, lo);
    mem.write_ram(offset + 1, hi);
}

/// MBC7: accelerometer and EEPROM in place of cartridge RAM.
pub(super) struct Mbc7 {
    rom_bank: u8,
    ram_enable: [bool; 2],
    tilt: (f32, f32),
    latched: (u16, u16),
    latch_erased: bool,
    eeprom: Eeprom,
}

impl Mbc7 {
    pub(super) fn new() -> Self {
        Self {
            rom_bank: 1,
            ram_enable: [false; 2],
            tilt: (0.0, 0.0),
            latched: (ACCEL_ERASED, ACCEL_ERASED),
            latch_erased: false,
            eeprom: Eeprom::new(),
        }
    }

    fn registers_enabled(&self) -> bool {
        self.ram_enable[0] && self.ram_enable[1]
    }

    fn axis(value: f32) -> u16 {
        let offset = (value.clamp(-1.0, 1.0) * ACCEL_RANGE) as i32;
        (i32::from(ACCEL_CENTER) + offset) as u16
    }
}

impl Mapper for Mbc7 {
    fn kind(&self) -> MapperKind {
        MapperKind::Mbc7
    }

    fn read(&mut self, mem: &CartridgeMemory, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => mem.rom_byte(0, addr),
            0x4000..=0x7FFF => mem.rom_byte(self.rom_bank(), addr),
            0xA000..=0xAFFF if self.registers_enabled() => match (addr >> 4) & 0x0F {
                0x2 => self.latched.0 as u8,
                0x3 => (self.latched.0 >> 8) as u8,
                0x4 => self.latched.1 as u8,
                0x5 => (self.latched.1 >> 8) as u8,
                0x6 => 0x00,
                0x8 => self.eeprom.read(),
                _ => 0xFF,
            },
            _ => 0xFF,
        }
    }

    fn write(&mut self, mem: &mut CartridgeMemory, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enable[0] = val == 0x0A,
            0x2000..=0x3FFF => self.rom_bank = val & 0x7F,
            0x4000..=0x5FFF => self.ram_enable[1] = val == 0x40,
            0xA000..=0xAFFF if self.registers_enabled() => match (addr >> 4) & 0x0F {
                0x0 if val == 0x55 => {
                    self.latched = (ACCEL_ERASED, ACCEL_ERASED);
                    self.latch_erased = true;
                }
                0x1 if val == 0xAA && self.latch_erased => {
                    self.latched = (Self::axis(self.tilt.0), Self::axis(self.tilt.1));
                    self.latch_erased = false;
                }
                0x8 => self.eeprom.write(val, mem),
                _ => {}
            },
            _ => {}
        }
    }

    fn rom_bank(&self) -> usize {
        usize::from(self.rom_bank)
    }

    fn set_accelerometer(&mut self, x: f32, y: f32) {
        self.tilt = (x, y);
    }
}
