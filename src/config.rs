//! Control directive parsing.
//!
//! Device configuration travels as a short string of whitespace-separated
//! tokens, e.g. `"r1 d1 b115200 l8 pn s1"`:
//!
//! | token | meaning |
//! |-------|---------|
//! | `b<rate>` | baud rate |
//! | `l<bits>` | word length |
//! | `p<o\|e\|n>` | parity: odd, even, anything else none |
//! | `s<1\|2>` | stop bits |
//! | `r<0\|1>` | RTS line |
//! | `d<0\|1>` | DTR line |
//!
//! Tokens with an unrecognized leading letter belong to other layers and
//! are skipped; a recognized letter with a malformed payload is an error.

use std::str::FromStr;

use crate::control::Parity;
use crate::error::{PortError, Result};

/// Baseline configuration applied at open, before caller directives.
pub const DEFAULT_DIRECTIVES: &str = "r1 d1 b115200 l8 pn s1";

/// One parsed configuration token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Baud(u32),
    WordLength(u8),
    Parity(Parity),
    StopBits(u8),
    Rts(bool),
    Dtr(bool),
}

/// Parse a directive string into tokens, in order of appearance.
pub fn parse(input: &str) -> Result<Vec<Directive>> {
    let mut directives = Vec::new();
    for token in input.split_whitespace() {
        let mut chars = token.chars();
        let letter = match chars.next() {
            Some(c) => c,
            None => continue,
        };
        let payload = chars.as_str();
        match letter {
            'b' => directives.push(Directive::Baud(number(token, payload)?)),
            'l' => directives.push(Directive::WordLength(number(token, payload)?)),
            's' => directives.push(Directive::StopBits(number(token, payload)?)),
            'p' => directives.push(Directive::Parity(match payload {
                "o" => Parity::Odd,
                "e" => Parity::Even,
                _ => Parity::None,
            })),
            'r' => directives.push(Directive::Rts(switch(token, payload)?)),
            'd' => directives.push(Directive::Dtr(switch(token, payload)?)),
            _ => {}
        }
    }
    Ok(directives)
}

fn number<T: FromStr>(token: &str, payload: &str) -> Result<T> {
    payload
        .parse()
        .map_err(|_| PortError::invalid(format!("bad control directive: {token:?}")))
}

fn switch(token: &str, payload: &str) -> Result<bool> {
    match payload {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(PortError::invalid(format!("bad control directive: {token:?}"))),
    }
}
