//! Text format for scripted bus traffic.
//!
//! One operation per line, `#` starts a comment:
//!
//! ```text
//! write ff07 05   # start the timer at 262144 Hz
//! idle 64
//! read ff05
//! halt
//! ```
//!
//! Addresses and values are hex, `idle` counts are decimal clocks.

use cadence_core::cpu::BusOp;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("line {line}: unknown operation `{op}`")]
    UnknownOp { line: usize, op: String },
    #[error("line {line}: `{op}` expects {expected} operand(s)")]
    Operands {
        line: usize,
        op: &'static str,
        expected: usize,
    },
    #[error("line {line}: invalid number `{text}`")]
    Number { line: usize, text: String },
}

pub fn parse(source: &str) -> Result<Vec<BusOp>, ScriptError> {
    let mut ops = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let text = raw.split('#').next().unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }
        let mut words = text.split_whitespace();
        let op = words.next().unwrap_or("").to_ascii_lowercase();
        let args: Vec<&str> = words.collect();
        let expect = |op: &'static str, expected: usize| {
            if args.len() == expected {
                Ok(())
            } else {
                Err(ScriptError::Operands { line, op, expected })
            }
        };
        let parsed = match op.as_str() {
            "read" => {
                expect("read", 1)?;
                BusOp::Read(hex_u16(line, args[0])?)
            }
            "write" => {
                expect("write", 2)?;
                BusOp::Write(hex_u16(line, args[0])?, hex_u8(line, args[1])?)
            }
            "idle" => {
                expect("idle", 1)?;
                let clocks = args[0]
                    .parse::<i32>()
                    .ok()
                    .filter(|&c| c > 0)
                    .ok_or_else(|| number_error(line, args[0]))?;
                BusOp::Idle(clocks)
            }
            "halt" => {
                expect("halt", 0)?;
                BusOp::Halt
            }
            "stop" => {
                expect("stop", 0)?;
                BusOp::Stop
            }
            other => {
                return Err(ScriptError::UnknownOp {
                    line,
                    op: other.to_string(),
                });
            }
        };
        ops.push(parsed);
    }
    Ok(ops)
}

fn number_error(line: usize, text: &str) -> ScriptError {
    ScriptError::Number {
        line,
        text: text.to_string(),
    }
}

fn strip_hex(text: &str) -> &str {
    text.strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix('$'))
        .unwrap_or(text)
}

fn hex_u16(line: usize, text: &str) -> Result<u16, ScriptError> {
    u16::from_str_radix(strip_hex(text), 16).map_err(|_| number_error(line, text))
}

fn hex_u8(line: usize, text: &str) -> Result<u8, ScriptError> {
    u8::from_str_radix(strip_hex(text), 16).map_err(|_| number_error(line, text))
}
