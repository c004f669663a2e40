//! The encoding layout of one instruction form.
//!
//! An [`Encoding`] is the structured decomposition of the textual encoding
//! syntax found in the Intel manual (`VEX.128.66.0F.W0 6E /r` and the
//! like). It knows how to serialise itself into machine-code bytes through
//! [`MachineCode`] and how to test whether a candidate byte sequence could
//! have been produced by it.

mod machine;
mod syntax;

pub use self::machine::{MachineCode, MachineCodeMatch, Mismatch, Vex, Evex};
pub use self::syntax::SyntaxError;

use serde::{Serialize, Serializer};

/// Legacy prefix bytes recognised by the grammar and the matcher.
pub const LEGACY_PREFIXES: &[u8] = &[
    0xF0, 0xF2, 0xF3, 0x2E, 0x36, 0x3E, 0x26, 0x64, 0x65, 0x66, 0x67,
];

/// A fixed value for the ModR/M.mod field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModRmMod {
    /// The mod field must hold exactly this two-bit value.
    Fixed(u8),
    /// Any mod value except 0b11 (the operand must be a memory form).
    NotRegister,
}

/// The structured decomposition of one textual instruction encoding.
///
/// Optional ModR/M fields use `Option` internally; the emitted database
/// keeps the manual's plus-one convention (0 meaning unconstrained, and 5
/// for "any mod except 11") so both representations interoperate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Encoding {
    /// The textual syntax this encoding was parsed from. Re-emitting an
    /// encoding yields this string unchanged.
    pub syntax: String,

    /// Opcodes acting as prefixes, such as FWAIT (0x9B).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prefix_opcodes: Vec<u8>,
    /// Legacy prefixes that must be present.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mandatory_prefixes: Vec<u8>,
    /// `NP`: the 66, F2 and F3 prefixes are forbidden.
    pub no_vex_prefixes: bool,
    /// `NFx`: the F2 and F3 prefixes are forbidden.
    pub no_rep_prefixes: bool,

    pub rex: bool,
    pub rex_r: bool,
    pub rex_w: bool,

    pub vex: bool,
    /// VEX.L / EVEX.L.
    pub vex_l: bool,
    /// Two-bit implied-prefix selector (none/66/F3/F2).
    pub vex_pp: u8,
    /// Five-bit opcode-map selector.
    pub vex_m_mmmm: u8,
    pub vex_w: bool,
    /// `WIG`: the W bit is ignored when matching.
    pub vex_w_ignored: bool,
    /// `/is4`: a register number is packed into the high nibble of the
    /// trailing immediate byte.
    pub vex_is4: bool,

    pub evex: bool,
    /// EVEX.L' (512-bit operation).
    pub evex_l_prime: bool,
    /// An opmask register may be attached to the destination.
    pub evex_mask: bool,
    /// `{z}` zeroing-masking is allowed.
    pub evex_zero: bool,
    /// `{er}` embedded rounding is allowed.
    pub evex_rounding: bool,
    /// `{sae}` suppress-all-exceptions is allowed.
    pub evex_sae: bool,

    pub opcodes: Vec<u8>,
    /// Index into `opcodes` of the byte that embeds a register number in
    /// its low three bits. Stored zero-based; serialised one-based with 0
    /// meaning absent.
    #[serde(serialize_with = "plus_one_index")]
    pub register_modifier: Option<usize>,
    /// Like `register_modifier` but embedding an x87 stack index.
    #[serde(serialize_with = "plus_one_index")]
    pub stack_index_modifier: Option<usize>,

    /// A code offset (rel8/rel32/ptr16:32...) follows the opcode.
    pub code_offset: bool,
    /// Size in bytes of the code offset declared by the cb/cw/cd/cp/co/ct
    /// token, 0 when absent.
    pub code_offset_bytes: u8,
    /// Size in bytes of the immediate declared by the ib/iw/id/io token,
    /// 0 when absent.
    pub immediate_bytes: u8,

    pub modrm: bool,
    #[serde(rename = "modRmMod", serialize_with = "plus_one_mod")]
    pub modrm_mod: Option<ModRmMod>,
    #[serde(rename = "modRmReg", serialize_with = "plus_one_field")]
    pub modrm_reg: Option<u8>,
    #[serde(rename = "modRmRm", serialize_with = "plus_one_field")]
    pub modrm_rm: Option<u8>,

    /// The SIB byte addresses a vector index register.
    pub vsib: bool,

    /// Trailing immediate bytes implied by the mnemonic itself, as used by
    /// the CMPEQPD-style pseudo-instructions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub implied_immediate: Vec<u8>,
}

/// Error returned for the one invalid vector-size combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidVectorSize;

impl std::fmt::Display for InvalidVectorSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("encoding sets both VEX.L and EVEX.L'")
    }
}

impl std::error::Error for InvalidVectorSize {}

impl Encoding {
    /// Parse the textual encoding grammar into its structured form.
    pub fn parse(syntax: &str) -> Result<Encoding, SyntaxError> {
        syntax::parse(syntax)
    }

    /// The canonical textual syntax. Parsing the returned string yields a
    /// value equal to `self`.
    pub fn syntax(&self) -> &str {
        &self.syntax
    }

    /// The vector operation size in bits: 0 without a VEX or EVEX prefix,
    /// otherwise 128, 256 or 512 from the L and L' bits.
    pub fn vector_size(&self) -> Result<u16, InvalidVectorSize> {
        if !self.vex && !self.evex {
            return Ok(0);
        }
        match (self.vex_l, self.evex_l_prime) {
            (false, false) => Ok(128),
            (true, false) => Ok(256),
            (false, true) => Ok(512),
            (true, true) => Err(InvalidVectorSize),
        }
    }

    /// True when any prefix forces the form out of 16/32-bit modes.
    pub fn needs_long_mode(&self) -> bool {
        self.rex
    }
}

fn plus_one_index<S: Serializer>(v: &Option<usize>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(v.map(|i| i as u64 + 1).unwrap_or(0))
}

fn plus_one_field<S: Serializer>(v: &Option<u8>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u8(v.map(|f| f + 1).unwrap_or(0))
}

fn plus_one_mod<S: Serializer>(v: &Option<ModRmMod>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u8(match v {
        None => 0,
        Some(ModRmMod::Fixed(m)) => m + 1,
        Some(ModRmMod::NotRegister) => 5,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_sizes() {
        let mut enc = Encoding::default();
        assert_eq!(enc.vector_size(), Ok(0));

        enc.vex = true;
        assert_eq!(enc.vector_size(), Ok(128));
        enc.vex_l = true;
        assert_eq!(enc.vector_size(), Ok(256));

        enc.vex = false;
        enc.vex_l = false;
        enc.evex = true;
        enc.evex_l_prime = true;
        assert_eq!(enc.vector_size(), Ok(512));

        enc.vex_l = true;
        assert_eq!(enc.vector_size(), Err(InvalidVectorSize));
    }
}
