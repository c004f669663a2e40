//! Parser for the textual instruction-encoding grammar.
//!
//! The grammar is the canonical interchange form between the manual, the
//! build tool and the runtime database. The parser is strict: any token it
//! does not recognise is an error, so the normalisation passes must have
//! cleaned the manual's quirks up front.

use super::{Encoding, ModRmMod, LEGACY_PREFIXES};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    Empty,
    UnknownToken { token: String },
    UnknownVexField { clause: String, field: String },
    /// A VEX clause without one of the 0F/0F38/0F3A map selectors.
    MissingVexMap { clause: String },
    /// An EVEX clause without a map selector.
    MissingEvexMap { clause: String },
    DuplicateCodeOffset,
    DuplicateIs4,
    BadModRmField { token: String },
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxError::Empty => write!(f, "empty encoding syntax"),
            SyntaxError::UnknownToken { token } => {
                write!(f, "unknown opcode token `{}`", token)
            }
            SyntaxError::UnknownVexField { clause, field } => {
                write!(f, "unknown field `{}` in `{}`", field, clause)
            }
            SyntaxError::MissingVexMap { clause } => {
                write!(f, "`{}` is missing its m_mmmm selector", clause)
            }
            SyntaxError::MissingEvexMap { clause } => {
                write!(f, "`{}` is missing its mm selector", clause)
            }
            SyntaxError::DuplicateCodeOffset => {
                write!(f, "encoding declares two code offsets")
            }
            SyntaxError::DuplicateIs4 => write!(f, "encoding declares /is4 twice"),
            SyntaxError::BadModRmField { token } => {
                write!(f, "malformed ModR/M field token `{}`", token)
            }
        }
    }
}

impl std::error::Error for SyntaxError {}

pub(super) fn parse(syntax: &str) -> Result<Encoding, SyntaxError> {
    let tokens: Vec<&str> = syntax.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(SyntaxError::Empty);
    }

    let mut enc = Encoding::default();
    enc.syntax = syntax.to_string();

    let mut saw_slash_r = false;
    for (i, &token) in tokens.iter().enumerate() {
        match token {
            "NP" => enc.no_vex_prefixes = true,
            "NFx" => enc.no_rep_prefixes = true,

            "REX" => enc.rex = true,
            "REX.R" => {
                enc.rex = true;
                enc.rex_r = true;
            }
            "REX.W" => {
                enc.rex = true;
                enc.rex_w = true;
            }

            // FWAIT acts as a one-byte prefix instruction when further
            // opcode bytes follow it.
            "9B" if enc.opcodes.is_empty() && i + 1 < tokens.len() => {
                enc.prefix_opcodes.push(0x9B);
            }

            "/r" => {
                enc.modrm = true;
                saw_slash_r = true;
            }
            "/0" | "/1" | "/2" | "/3" | "/4" | "/5" | "/6" | "/7" => {
                enc.modrm = true;
                enc.modrm_reg = Some(token.as_bytes()[1] - b'0');
            }
            "/is4" => {
                if enc.vex_is4 {
                    return Err(SyntaxError::DuplicateIs4);
                }
                enc.vex_is4 = true;
            }
            "/vsib" => {
                enc.modrm = true;
                enc.vsib = true;
            }

            "cb" | "cw" | "cd" | "cp" | "co" | "ct" => {
                if enc.code_offset {
                    return Err(SyntaxError::DuplicateCodeOffset);
                }
                enc.code_offset = true;
                enc.code_offset_bytes = match token {
                    "cb" => 1,
                    "cw" => 2,
                    "cd" => 4,
                    "cp" => 6,
                    "co" => 8,
                    _ => 10,
                };
            }
            "ib" | "iw" | "id" | "io" => {
                enc.immediate_bytes = match token {
                    "ib" => 1,
                    "iw" => 2,
                    "id" => 4,
                    _ => 8,
                };
            }

            _ if token.starts_with("VEX.") => parse_vex(&mut enc, token, false)?,
            _ if token.starts_with("EVEX.") => parse_vex(&mut enc, token, true)?,

            _ => {
                if let Some(byte) = hex_byte(token) {
                    if enc.opcodes.is_empty() && LEGACY_PREFIXES.contains(&byte) {
                        enc.mandatory_prefixes.push(byte);
                    } else if saw_slash_r {
                        enc.implied_immediate.push(byte);
                    } else {
                        enc.opcodes.push(byte);
                    }
                } else if let Some((byte, modifier)) = register_modified(token) {
                    enc.opcodes.push(byte);
                    match modifier {
                        Modifier::Register => {
                            enc.register_modifier = Some(enc.opcodes.len() - 1)
                        }
                        Modifier::StackIndex => {
                            enc.stack_index_modifier = Some(enc.opcodes.len() - 1)
                        }
                    }
                } else if token.contains(':') {
                    parse_modrm_fields(&mut enc, token)?;
                } else {
                    return Err(SyntaxError::UnknownToken {
                        token: token.to_string(),
                    });
                }
            }
        }
    }

    Ok(enc)
}

enum Modifier {
    Register,
    StackIndex,
}

fn hex_byte(token: &str) -> Option<u8> {
    if token.len() == 2 && token.bytes().all(|b| b.is_ascii_hexdigit()) {
        u8::from_str_radix(token, 16).ok()
    } else {
        None
    }
}

/// Parses `<hh>+rb` / `+rw` / `+rd` / `+ro` / `+i` opcode modifiers.
fn register_modified(token: &str) -> Option<(u8, Modifier)> {
    let (head, tail) = token.split_at(token.find('+')?);
    let byte = hex_byte(head)?;
    match tail {
        "+rb" | "+rw" | "+rd" | "+ro" => Some((byte, Modifier::Register)),
        "+i" => Some((byte, Modifier::StackIndex)),
        _ => None,
    }
}

/// Parses the `<mod>:<reg>:<rm>` fixed ModR/M field token.
fn parse_modrm_fields(enc: &mut Encoding, token: &str) -> Result<(), SyntaxError> {
    let bad = || SyntaxError::BadModRmField {
        token: token.to_string(),
    };

    let mut parts = token.split(':');
    let (m, reg, rm) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(reg), Some(rm), None) => (m, reg, rm),
        _ => return Err(bad()),
    };

    enc.modrm = true;
    enc.modrm_mod = match m {
        "!(11)" => Some(ModRmMod::NotRegister),
        "00" | "01" | "10" | "11" => {
            Some(ModRmMod::Fixed(u8::from_str_radix(m, 2).unwrap()))
        }
        _ => return Err(bad()),
    };
    enc.modrm_reg = match reg {
        "rrr" => None,
        _ => Some(binary_triplet(reg).ok_or_else(bad)?),
    };
    enc.modrm_rm = match rm {
        "bbb" => None,
        _ => Some(binary_triplet(rm).ok_or_else(bad)?),
    };
    Ok(())
}

fn binary_triplet(s: &str) -> Option<u8> {
    if s.len() == 3 && s.bytes().all(|b| b == b'0' || b == b'1') {
        u8::from_str_radix(s, 2).ok()
    } else {
        None
    }
}

/// Parses a `VEX.<fields>` or `EVEX.<fields>` clause.
fn parse_vex(enc: &mut Encoding, clause: &str, evex: bool) -> Result<(), SyntaxError> {
    if evex {
        enc.evex = true;
    } else {
        enc.vex = true;
    }

    let mut have_map = false;
    for field in clause.split('.').skip(1) {
        match field {
            // Operand-pattern markers; they do not change the prefix bytes.
            "NDS" | "NDD" | "DDS" => {}

            "128" | "L0" | "LZ" | "LIG" => enc.vex_l = false,
            "256" | "L1" => enc.vex_l = true,
            "512" if evex => enc.evex_l_prime = true,
            "LLIG" if evex => {
                enc.vex_l = false;
                enc.evex_l_prime = false;
            }

            "NP" => enc.vex_pp = 0b00,
            "66" => enc.vex_pp = 0b01,
            "F3" => enc.vex_pp = 0b10,
            "F2" => enc.vex_pp = 0b11,

            "0F" => {
                enc.vex_m_mmmm = 0b00001;
                have_map = true;
            }
            "0F38" => {
                enc.vex_m_mmmm = 0b00010;
                have_map = true;
            }
            "0F3A" => {
                enc.vex_m_mmmm = 0b00011;
                have_map = true;
            }
            "MAP5" if evex => {
                enc.vex_m_mmmm = 0b00101;
                have_map = true;
            }
            "MAP6" if evex => {
                enc.vex_m_mmmm = 0b00110;
                have_map = true;
            }

            "W0" => enc.vex_w = false,
            "W1" => enc.vex_w = true,
            "WIG" => {
                enc.vex_w = false;
                enc.vex_w_ignored = true;
            }

            _ => {
                return Err(SyntaxError::UnknownVexField {
                    clause: clause.to_string(),
                    field: field.to_string(),
                })
            }
        }
    }

    if !have_map {
        return Err(if evex {
            SyntaxError::MissingEvexMap {
                clause: clause.to_string(),
            }
        } else {
            SyntaxError::MissingVexMap {
                clause: clause.to_string(),
            }
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_opcode_with_modrm() {
        let enc = Encoding::parse("0F 6E /r").unwrap();
        assert_eq!(enc.opcodes, vec![0x0F, 0x6E]);
        assert!(enc.modrm);
        assert_eq!(enc.modrm_reg, None);
    }

    #[test]
    fn vex_clause() {
        let enc = Encoding::parse("VEX.128.66.0F.W0 6E /r").unwrap();
        assert!(enc.vex && !enc.evex);
        assert!(!enc.vex_l);
        assert_eq!(enc.vex_pp, 0b01);
        assert_eq!(enc.vex_m_mmmm, 0b00001);
        assert!(!enc.vex_w);
        assert_eq!(enc.opcodes, vec![0x6E]);
        assert!(enc.modrm);
    }

    #[test]
    fn evex_clause() {
        let enc = Encoding::parse("EVEX.512.66.0F38.W1 7C /r").unwrap();
        assert!(enc.evex && !enc.vex);
        assert!(enc.evex_l_prime && !enc.vex_l);
        assert_eq!(enc.vex_pp, 0b01);
        assert_eq!(enc.vex_m_mmmm, 0b00010);
        assert!(enc.vex_w);
    }

    #[test]
    fn mandatory_prefix_before_opcode() {
        let enc = Encoding::parse("66 0F 6E /r").unwrap();
        assert_eq!(enc.mandatory_prefixes, vec![0x66]);
        assert_eq!(enc.opcodes, vec![0x0F, 0x6E]);
    }

    #[test]
    fn prefix_opcode_fwait() {
        let enc = Encoding::parse("9B D9 /7").unwrap();
        assert_eq!(enc.prefix_opcodes, vec![0x9B]);
        assert_eq!(enc.opcodes, vec![0xD9]);
        assert_eq!(enc.modrm_reg, Some(7));

        // A lone 9B is the FWAIT opcode itself, not a prefix.
        let fwait = Encoding::parse("9B").unwrap();
        assert!(fwait.prefix_opcodes.is_empty());
        assert_eq!(fwait.opcodes, vec![0x9B]);
    }

    #[test]
    fn register_modified_opcode() {
        let enc = Encoding::parse("REX.W B8+rd io").unwrap();
        assert!(enc.rex && enc.rex_w);
        assert_eq!(enc.opcodes, vec![0xB8]);
        assert_eq!(enc.register_modifier, Some(0));
        assert_eq!(enc.immediate_bytes, 8);
    }

    #[test]
    fn stack_index_opcode() {
        let enc = Encoding::parse("D8 C0+i").unwrap();
        assert_eq!(enc.opcodes, vec![0xD8, 0xC0]);
        assert_eq!(enc.stack_index_modifier, Some(1));
    }

    #[test]
    fn fixed_modrm_fields() {
        let enc = Encoding::parse("0F 01 11:010:bbb").unwrap();
        assert!(enc.modrm);
        assert_eq!(enc.modrm_mod, Some(ModRmMod::Fixed(0b11)));
        assert_eq!(enc.modrm_reg, Some(0b010));
        assert_eq!(enc.modrm_rm, None);

        let enc = Encoding::parse("0F C7 !(11):001:bbb").unwrap();
        assert_eq!(enc.modrm_mod, Some(ModRmMod::NotRegister));
    }

    #[test]
    fn implied_immediate_after_slash_r() {
        let enc = Encoding::parse("66 0F C2 /r 00").unwrap();
        assert_eq!(enc.opcodes, vec![0x0F, 0xC2]);
        assert_eq!(enc.implied_immediate, vec![0x00]);
    }

    #[test]
    fn code_offset_tokens() {
        let enc = Encoding::parse("E8 cd").unwrap();
        assert!(enc.code_offset);
        assert_eq!(enc.code_offset_bytes, 4);

        assert_eq!(
            Encoding::parse("E8 cd cb"),
            Err(SyntaxError::DuplicateCodeOffset)
        );
    }

    #[test]
    fn rejected_syntax() {
        assert_eq!(
            Encoding::parse("0F XYZ"),
            Err(SyntaxError::UnknownToken {
                token: "XYZ".to_string()
            })
        );
        assert!(matches!(
            Encoding::parse("VEX.128.66.W0 6E /r"),
            Err(SyntaxError::MissingVexMap { .. })
        ));
        assert!(matches!(
            Encoding::parse(""),
            Err(SyntaxError::Empty)
        ));
    }

    #[test]
    fn round_trips_through_the_stored_syntax() {
        for syntax in [
            "VEX.128.66.0F.W0 6E /r",
            "EVEX.512.66.0F38.W1 7C /r",
            "9B D9 /7",
            "REX.W B8+rd io",
            "66 0F C2 /r 00",
            "NP 0F 01 C1",
        ] {
            let enc = Encoding::parse(syntax).unwrap();
            assert_eq!(enc.syntax(), syntax);
            assert_eq!(Encoding::parse(enc.syntax()).unwrap(), enc);
        }
    }
}
