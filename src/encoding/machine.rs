//! Realised machine code and the byte-sequence matcher.
//!
//! [`MachineCode`] holds the concrete bytes of one encoded instruction,
//! section by section, in the order mandated by the Intel SDM. The matcher
//! on [`Encoding`] walks a candidate byte sequence and reports the first
//! divergence; it is a pre-filter and deliberately ignores operand bytes
//! (SIB, displacement, immediates) beyond the implied-immediate suffix.

use super::{Encoding, ModRmMod, LEGACY_PREFIXES};
use std::fmt;

/// Raw VEX prefix fields. The R/X/B and vvvv values are stored exactly as
/// they are emitted, which for register numbers means already inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vex {
    pub r: bool,
    pub x: bool,
    pub b: bool,
    pub w: bool,
    pub l: bool,
    pub pp: u8,
    pub m_mmmm: u8,
    pub vvvv: u8,
}

impl Vex {
    /// The three-byte form compresses to two bytes when X and B carry no
    /// extension (stored as 1), W is clear and the map is 0F.
    pub fn is_two_byte(&self) -> bool {
        self.x && self.b && !self.w && self.m_mmmm == 0b00001
    }

    fn emit(&self, buf: &mut Vec<u8>) {
        if self.is_two_byte() {
            // The R bit takes over the W bit's position in byte two.
            buf.push(0xC5);
            buf.push(bit(self.r, 7) | (self.vvvv & 0xF) << 3 | bit(self.l, 2) | self.pp);
        } else {
            buf.push(0xC4);
            buf.push(bit(self.r, 7) | bit(self.x, 6) | bit(self.b, 5) | (self.m_mmmm & 0x1F));
            buf.push(bit(self.w, 7) | (self.vvvv & 0xF) << 3 | bit(self.l, 2) | self.pp);
        }
    }

    fn len(&self) -> usize {
        if self.is_two_byte() {
            2
        } else {
            3
        }
    }
}

/// Raw EVEX prefix fields, stored as emitted (extension bits inverted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evex {
    pub r: bool,
    pub x: bool,
    pub b: bool,
    pub r_prime: bool,
    pub mm: u8,
    pub w: bool,
    pub vvvv: u8,
    pub pp: u8,
    pub z: bool,
    pub l_prime: bool,
    pub l: bool,
    pub broadcast: bool,
    pub v_prime: bool,
    pub aaa: u8,
}

impl Evex {
    fn emit(&self, buf: &mut Vec<u8>) {
        buf.push(0x62);
        buf.push(
            bit(self.r, 7) | bit(self.x, 6) | bit(self.b, 5) | bit(self.r_prime, 4)
                | (self.mm & 0b111),
        );
        buf.push(bit(self.w, 7) | (self.vvvv & 0xF) << 3 | 0b100 | self.pp);
        buf.push(
            bit(self.z, 7)
                | bit(self.l_prime, 6)
                | bit(self.l, 5)
                | bit(self.broadcast, 4)
                | bit(self.v_prime, 3)
                | (self.aaa & 0b111),
        );
    }
}

fn bit(b: bool, shift: u8) -> u8 {
    (b as u8) << shift
}

/// One encoded instruction, section by section.
///
/// Sections are emitted in SDM order: prefix opcodes, legacy prefixes, REX
/// xor VEX xor EVEX, opcode, code offset, ModR/M, SIB, displacement,
/// immediate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachineCode {
    pub prefix_opcodes: Vec<u8>,
    pub prefixes: Vec<u8>,
    pub rex: Option<u8>,
    pub vex: Option<Vex>,
    pub evex: Option<Evex>,
    pub opcode: Vec<u8>,
    pub code_offset: Vec<u8>,
    pub modrm: Option<u8>,
    pub sib: Option<u8>,
    pub displacement: Vec<u8>,
    pub immediate: Vec<u8>,
}

impl MachineCode {
    /// A minimally-populated realisation of `encoding`: every section the
    /// encoding requires is present with neutral operand values. Useful as
    /// the starting point for an assembler and for self-match testing.
    pub fn template(encoding: &Encoding) -> MachineCode {
        let mut code = MachineCode::default();
        code.prefix_opcodes = encoding.prefix_opcodes.clone();
        code.prefixes = encoding.mandatory_prefixes.clone();

        if encoding.rex {
            code.rex = Some(
                0b0100_0000
                    | bit(encoding.rex_w, 3)
                    | bit(encoding.rex_r, 2),
            );
        }

        if encoding.evex {
            code.evex = Some(Evex {
                r: true,
                x: true,
                b: true,
                r_prime: true,
                mm: encoding.vex_m_mmmm & 0b111,
                w: encoding.vex_w,
                vvvv: 0b1111,
                pp: encoding.vex_pp,
                z: false,
                l_prime: encoding.evex_l_prime,
                l: encoding.vex_l,
                broadcast: false,
                v_prime: true,
                aaa: 0,
            });
        } else if encoding.vex {
            code.vex = Some(Vex {
                r: true,
                x: true,
                b: true,
                w: encoding.vex_w,
                l: encoding.vex_l,
                pp: encoding.vex_pp,
                m_mmmm: encoding.vex_m_mmmm,
                vvvv: 0b1111,
            });
        }

        code.opcode = encoding.opcodes.clone();
        code.code_offset = vec![0; encoding.code_offset_bytes as usize];

        if encoding.modrm {
            let m = match encoding.modrm_mod {
                Some(ModRmMod::Fixed(m)) => m,
                Some(ModRmMod::NotRegister) => 0b00,
                // Default to the register form so that no SIB or
                // displacement sections are implied.
                None => 0b11,
            };
            code.modrm = Some(
                (m << 6)
                    | (encoding.modrm_reg.unwrap_or(0) << 3)
                    | encoding.modrm_rm.unwrap_or(0),
            );
        }

        if !encoding.implied_immediate.is_empty() {
            code.immediate = encoding.implied_immediate.clone();
        } else {
            code.immediate = vec![0; encoding.immediate_bytes as usize];
        }

        code
    }

    /// Appends the encoded bytes to `buf`.
    ///
    /// Panics when the stored VEX and EVEX sections are both present; an
    /// encoding that came through the grammar can never produce that.
    pub fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.prefix_opcodes);
        buf.extend_from_slice(&self.prefixes);
        if let Some(rex) = self.rex {
            buf.push(rex);
        }
        match (&self.vex, &self.evex) {
            (Some(vex), None) => vex.emit(buf),
            (None, Some(evex)) => evex.emit(buf),
            (None, None) => {}
            (Some(_), Some(_)) => panic!("machine code carries both a VEX and an EVEX prefix"),
        }
        buf.extend_from_slice(&self.opcode);
        buf.extend_from_slice(&self.code_offset);
        if let Some(modrm) = self.modrm {
            buf.push(modrm);
        }
        if let Some(sib) = self.sib {
            buf.push(sib);
        }
        buf.extend_from_slice(&self.displacement);
        buf.extend_from_slice(&self.immediate);
    }

    /// The encoded bytes as a fresh vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.len());
        self.encode_to(&mut buf);
        buf
    }

    /// The number of bytes [`MachineCode::encode_to`] will write. Used by
    /// callers that reserve space before writing.
    pub fn len(&self) -> usize {
        self.prefix_opcodes.len()
            + self.prefixes.len()
            + self.rex.map_or(0, |_| 1)
            + self.vex.as_ref().map_or(0, Vex::len)
            + self.evex.as_ref().map_or(0, |_| 4)
            + self.opcode.len()
            + self.code_offset.len()
            + self.modrm.map_or(0, |_| 1)
            + self.sib.map_or(0, |_| 1)
            + self.displacement.len()
            + self.immediate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The verdict of matching a byte sequence against an [`Encoding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineCodeMatch {
    Match,
    Mismatch(Mismatch),
}

/// Every way a byte sequence can fail to match an encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    MissingPrefixOpcode,
    ForbiddenPrefix66,
    ForbiddenPrefixF2,
    ForbiddenPrefixF3,
    ForbiddenRepPrefix,
    MissingMandatoryPrefix,
    MissingRex,
    MissingRexR,
    MissingRexW,
    MissingVex,
    TruncatedVex,
    UnexpectedTwoByteVex,
    WrongVexMmmmm,
    WrongVexW,
    WrongVexL,
    WrongVexPp,
    MissingEvex,
    TruncatedEvex,
    WrongEvexMm,
    WrongEvexW,
    WrongEvexL,
    WrongEvexPp,
    WrongOpcode,
    WrongRegisterModifiedOpcode,
    MissingModRm,
    WrongModRmReg,
    MissingImpliedImmediate,
    WrongImpliedImmediate,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mismatch::MissingPrefixOpcode => "missing prefix opcode",
            Mismatch::ForbiddenPrefix66 => "forbidden 66 prefix",
            Mismatch::ForbiddenPrefixF2 => "forbidden F2 prefix",
            Mismatch::ForbiddenPrefixF3 => "forbidden F3 prefix",
            Mismatch::ForbiddenRepPrefix => "forbidden REP prefix",
            Mismatch::MissingMandatoryPrefix => "missing mandatory prefix",
            Mismatch::MissingRex => "missing REX prefix",
            Mismatch::MissingRexR => "missing REX.R",
            Mismatch::MissingRexW => "missing REX.W",
            Mismatch::MissingVex => "missing VEX prefix",
            Mismatch::TruncatedVex => "truncated VEX prefix",
            Mismatch::UnexpectedTwoByteVex => "unexpected 2-byte VEX prefix",
            Mismatch::WrongVexMmmmm => "wrong VEX.m_mmmm",
            Mismatch::WrongVexW => "wrong VEX.W",
            Mismatch::WrongVexL => "wrong VEX.L",
            Mismatch::WrongVexPp => "wrong VEX.pp",
            Mismatch::MissingEvex => "missing EVEX prefix",
            Mismatch::TruncatedEvex => "truncated EVEX prefix",
            Mismatch::WrongEvexMm => "wrong EVEX.mm",
            Mismatch::WrongEvexW => "wrong EVEX.W",
            Mismatch::WrongEvexL => "wrong EVEX.L'L",
            Mismatch::WrongEvexPp => "wrong EVEX.pp",
            Mismatch::WrongOpcode => "wrong opcode",
            Mismatch::WrongRegisterModifiedOpcode => "wrong register-modified opcode",
            Mismatch::MissingModRm => "missing ModR/M byte",
            Mismatch::WrongModRmReg => "wrong ModR/M.reg",
            Mismatch::MissingImpliedImmediate => "missing implied immediate",
            Mismatch::WrongImpliedImmediate => "wrong implied immediate",
        };
        f.write_str(s)
    }
}

macro_rules! mismatch {
    ($reason:ident) => {
        return MachineCodeMatch::Mismatch(Mismatch::$reason)
    };
}

impl Encoding {
    /// Tests whether `bytes` could have been produced by this encoding.
    ///
    /// This is a total function over arbitrary input: bad bytes yield a
    /// [`Mismatch`] reason, never a panic. Operand bytes (SIB,
    /// displacement, plain immediates) are not validated; the caller
    /// disambiguates the surviving candidates.
    pub fn matches_machine_code(&self, bytes: &[u8]) -> MachineCodeMatch {
        let mut rest = bytes;

        // 1. Required prefix opcodes.
        for &po in &self.prefix_opcodes {
            match rest.split_first() {
                Some((&b, tail)) if b == po => rest = tail,
                _ => mismatch!(MissingPrefixOpcode),
            }
        }

        // 2. Legacy prefixes.
        let mut prefixes: Vec<u8> = Vec::new();
        while let Some((&b, tail)) = rest.split_first() {
            if LEGACY_PREFIXES.contains(&b) {
                prefixes.push(b);
                rest = tail;
            } else {
                break;
            }
        }
        if self.no_vex_prefixes {
            if prefixes.contains(&0x66) {
                mismatch!(ForbiddenPrefix66);
            }
            if prefixes.contains(&0xF2) {
                mismatch!(ForbiddenPrefixF2);
            }
            if prefixes.contains(&0xF3) {
                mismatch!(ForbiddenPrefixF3);
            }
        }
        if self.no_rep_prefixes && (prefixes.contains(&0xF2) || prefixes.contains(&0xF3)) {
            mismatch!(ForbiddenRepPrefix);
        }
        for required in &self.mandatory_prefixes {
            if !prefixes.contains(required) {
                mismatch!(MissingMandatoryPrefix);
            }
        }

        // 3. REX.
        if self.rex {
            match rest.split_first() {
                Some((&b, tail)) if b >> 4 == 0b0100 => {
                    if self.rex_r && b & 0b0100 == 0 {
                        mismatch!(MissingRexR);
                    }
                    if self.rex_w && b & 0b1000 == 0 {
                        mismatch!(MissingRexW);
                    }
                    rest = tail;
                }
                _ => mismatch!(MissingRex),
            }
        } else if let Some((&b, tail)) = rest.split_first() {
            // An optional REX may appear, unless the opcode itself lives
            // in the 0x40 row.
            let opcode_in_rex_row = self.opcodes.first().map_or(false, |&op| op >> 4 == 0x4);
            if b >> 4 == 0b0100 && !opcode_in_rex_row && !self.vex && !self.evex {
                rest = tail;
            }
        }

        // 4/5. EVEX or VEX.
        if self.evex {
            match rest.split_first() {
                Some((&0x62, tail)) => {
                    if tail.len() < 3 {
                        mismatch!(TruncatedEvex);
                    }
                    let (p0, p1, p2) = (tail[0], tail[1], tail[2]);
                    if p0 & 0b111 != self.vex_m_mmmm & 0b111 {
                        mismatch!(WrongEvexMm);
                    }
                    if !self.vex_w_ignored && (p1 >> 7 == 1) != self.vex_w {
                        mismatch!(WrongEvexW);
                    }
                    if ((p2 >> 6) & 1 == 1) != self.evex_l_prime
                        || ((p2 >> 5) & 1 == 1) != self.vex_l
                    {
                        mismatch!(WrongEvexL);
                    }
                    if p1 & 0b11 != self.vex_pp {
                        mismatch!(WrongEvexPp);
                    }
                    rest = &tail[3..];
                }
                _ => mismatch!(MissingEvex),
            }
        } else if self.vex {
            match rest.split_first() {
                Some((&0xC4, tail)) => {
                    if tail.len() < 2 {
                        mismatch!(TruncatedVex);
                    }
                    let (b1, b2) = (tail[0], tail[1]);
                    if b1 & 0b11111 != self.vex_m_mmmm {
                        mismatch!(WrongVexMmmmm);
                    }
                    if !self.vex_w_ignored && (b2 >> 7 == 1) != self.vex_w {
                        mismatch!(WrongVexW);
                    }
                    if ((b2 >> 2) & 1 == 1) != self.vex_l {
                        mismatch!(WrongVexL);
                    }
                    if b2 & 0b11 != self.vex_pp {
                        mismatch!(WrongVexPp);
                    }
                    rest = &tail[2..];
                }
                Some((&0xC5, tail)) => {
                    if self.vex_w || self.vex_m_mmmm != 0b00001 {
                        mismatch!(UnexpectedTwoByteVex);
                    }
                    if tail.is_empty() {
                        mismatch!(TruncatedVex);
                    }
                    let b1 = tail[0];
                    if ((b1 >> 2) & 1 == 1) != self.vex_l {
                        mismatch!(WrongVexL);
                    }
                    if b1 & 0b11 != self.vex_pp {
                        mismatch!(WrongVexPp);
                    }
                    rest = &tail[1..];
                }
                _ => mismatch!(MissingVex),
            }
        }

        // 6. Opcode bytes, with a +0..+7 window at a modifier index.
        let modifier = self.register_modifier.or(self.stack_index_modifier);
        for (i, &op) in self.opcodes.iter().enumerate() {
            match rest.split_first() {
                Some((&b, tail)) => {
                    if modifier == Some(i) {
                        if b < op || u16::from(b) > u16::from(op) + 7 {
                            mismatch!(WrongRegisterModifiedOpcode);
                        }
                    } else if b != op {
                        mismatch!(WrongOpcode);
                    }
                    rest = tail;
                }
                None => mismatch!(WrongOpcode),
            }
        }

        // Code-offset bytes are operand data; skip over them.
        if self.code_offset {
            let skip = (self.code_offset_bytes as usize).min(rest.len());
            rest = &rest[skip..];
        }

        // 7. ModR/M.
        if self.modrm {
            match rest.split_first() {
                Some((&b, tail)) => {
                    if let Some(reg) = self.modrm_reg {
                        if (b >> 3) & 0b111 != reg {
                            mismatch!(WrongModRmReg);
                        }
                    }
                    rest = tail;
                }
                None => mismatch!(MissingModRm),
            }
        }

        // 8. The implied immediate must be a suffix of what remains.
        if !self.implied_immediate.is_empty() {
            if rest.len() < self.implied_immediate.len() {
                mismatch!(MissingImpliedImmediate);
            }
            if !rest.ends_with(&self.implied_immediate) {
                mismatch!(WrongImpliedImmediate);
            }
        }

        MachineCodeMatch::Match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Encoding {
        Encoding::parse(s).unwrap()
    }

    #[test]
    fn two_byte_vex_compression() {
        let code = MachineCode {
            vex: Some(Vex {
                r: true,
                x: true,
                b: true,
                w: false,
                l: false,
                pp: 0b01,
                m_mmmm: 0b00001,
                vvvv: 0b1111,
            }),
            opcode: vec![0x6E],
            modrm: Some(0xC0),
            ..MachineCode::default()
        };
        assert_eq!(code.encode(), vec![0xC5, 0xF9, 0x6E, 0xC0]);
        assert_eq!(code.len(), 4);
    }

    #[test]
    fn three_byte_vex_when_w_is_set() {
        let code = MachineCode {
            vex: Some(Vex {
                r: true,
                x: true,
                b: true,
                w: true,
                l: false,
                pp: 0b01,
                m_mmmm: 0b00001,
                vvvv: 0b1111,
            }),
            opcode: vec![0x6E],
            modrm: Some(0xC0),
            ..MachineCode::default()
        };
        assert_eq!(code.encode(), vec![0xC4, 0xE1, 0xF9, 0x6E, 0xC0]);

        // Any non-0F map also forces the three-byte form.
        let mut wide_map = code.clone();
        wide_map.vex.as_mut().unwrap().w = false;
        wide_map.vex.as_mut().unwrap().m_mmmm = 0b00010;
        assert_eq!(wide_map.encode()[0], 0xC4);
    }

    #[test]
    fn evex_is_always_four_bytes() {
        let enc = parse("EVEX.512.66.0F38.W1 7C /r");
        let code = MachineCode::template(&enc);
        let bytes = code.encode();
        assert_eq!(bytes[0], 0x62);
        assert_eq!(bytes.len(), code.len());
        // P2 carries L' for the 512-bit form.
        assert_eq!((bytes[3] >> 6) & 1, 1);
    }

    #[test]
    fn length_matches_encoding() {
        for syntax in [
            "0F 6E /r",
            "66 0F 6E /r",
            "REX.W B8+rd io",
            "VEX.128.66.0F.W0 6E /r",
            "EVEX.256.F3.0F38.W0 29 /r",
            "E8 cd",
            "9B D9 /7",
        ] {
            let code = MachineCode::template(&parse(syntax));
            assert_eq!(code.len(), code.encode().len(), "length of {}", syntax);
        }
    }

    #[test]
    fn template_matches_itself() {
        for syntax in [
            "0F 6E /r",
            "66 0F 6E /r",
            "F3 0F B8 /r",
            "REX.W B8+rd io",
            "VEX.128.66.0F.W0 6E /r",
            "VEX.256.66.0F3A.W0 4B /r /is4",
            "EVEX.512.66.0F38.W1 7C /r",
            "E8 cd",
            "9B D9 /7",
            "66 0F C2 /r 00",
            "0F 01 11:010:bbb",
        ] {
            let enc = parse(syntax);
            let bytes = MachineCode::template(&enc).encode();
            assert_eq!(
                enc.matches_machine_code(&bytes),
                MachineCodeMatch::Match,
                "self-match of {}",
                syntax
            );
        }
    }

    #[test]
    fn wrong_opcode_is_reported() {
        let enc = parse("66 0F 6E /r");
        assert_eq!(
            enc.matches_machine_code(&[0x66, 0x6F, 0xC0]),
            MachineCodeMatch::Mismatch(Mismatch::WrongOpcode)
        );
    }

    #[test]
    fn missing_mandatory_prefix_is_reported() {
        let enc = parse("66 0F 6E /r");
        assert_eq!(
            enc.matches_machine_code(&[0x0F, 0x6E, 0xC0]),
            MachineCodeMatch::Mismatch(Mismatch::MissingMandatoryPrefix)
        );
    }

    #[test]
    fn forbidden_prefixes_are_reported() {
        let enc = parse("NP 0F 6E /r");
        assert_eq!(
            enc.matches_machine_code(&[0x66, 0x0F, 0x6E, 0xC0]),
            MachineCodeMatch::Mismatch(Mismatch::ForbiddenPrefix66)
        );

        let nfx = parse("NFx 0F C7 /1");
        assert_eq!(
            nfx.matches_machine_code(&[0xF3, 0x0F, 0xC7, 0xC8]),
            MachineCodeMatch::Mismatch(Mismatch::ForbiddenRepPrefix)
        );
    }

    #[test]
    fn rex_requirements() {
        let enc = parse("REX.W 89 /r");
        assert_eq!(
            enc.matches_machine_code(&[0x48, 0x89, 0xC0]),
            MachineCodeMatch::Match
        );
        assert_eq!(
            enc.matches_machine_code(&[0x40, 0x89, 0xC0]),
            MachineCodeMatch::Mismatch(Mismatch::MissingRexW)
        );
        assert_eq!(
            enc.matches_machine_code(&[0x89, 0xC0]),
            MachineCodeMatch::Mismatch(Mismatch::MissingRex)
        );
    }

    #[test]
    fn optional_rex_is_stripped() {
        let enc = parse("89 /r");
        assert_eq!(
            enc.matches_machine_code(&[0x48, 0x89, 0xC0]),
            MachineCodeMatch::Match
        );
        // The 0x40 opcode row must not be eaten as a REX prefix.
        let inc = parse("40+rd");
        assert_eq!(
            inc.matches_machine_code(&[0x43]),
            MachineCodeMatch::Match
        );
    }

    #[test]
    fn two_byte_vex_rejected_when_w_required() {
        let enc = parse("VEX.128.66.0F.W1 6E /r");
        assert_eq!(
            enc.matches_machine_code(&[0xC5, 0xF9, 0x6E, 0xC0]),
            MachineCodeMatch::Mismatch(Mismatch::UnexpectedTwoByteVex)
        );
    }

    #[test]
    fn register_modified_opcode_window() {
        let enc = parse("B8+rd id");
        assert_eq!(
            enc.matches_machine_code(&[0xBF, 0, 0, 0, 0]),
            MachineCodeMatch::Match
        );
        assert_eq!(
            enc.matches_machine_code(&[0xC0, 0, 0, 0, 0]),
            MachineCodeMatch::Mismatch(Mismatch::WrongRegisterModifiedOpcode)
        );
    }

    #[test]
    fn modrm_reg_is_checked() {
        let enc = parse("FF /2");
        assert_eq!(
            enc.matches_machine_code(&[0xFF, 0xD0]),
            MachineCodeMatch::Match
        );
        assert_eq!(
            enc.matches_machine_code(&[0xFF, 0xE0]),
            MachineCodeMatch::Mismatch(Mismatch::WrongModRmReg)
        );
        assert_eq!(
            enc.matches_machine_code(&[0xFF]),
            MachineCodeMatch::Mismatch(Mismatch::MissingModRm)
        );
    }

    #[test]
    fn implied_immediate_suffix() {
        let enc = parse("66 0F C2 /r 00");
        assert_eq!(
            enc.matches_machine_code(&[0x66, 0x0F, 0xC2, 0xC1, 0x00]),
            MachineCodeMatch::Match
        );
        assert_eq!(
            enc.matches_machine_code(&[0x66, 0x0F, 0xC2, 0xC1, 0x07]),
            MachineCodeMatch::Mismatch(Mismatch::WrongImpliedImmediate)
        );
        assert_eq!(
            enc.matches_machine_code(&[0x66, 0x0F, 0xC2]),
            MachineCodeMatch::Mismatch(Mismatch::MissingImpliedImmediate)
        );
    }
}
