//! The canonical instruction form consumed by downstream code.

use crate::encoding::Encoding;
use crate::register::RegId;
use serde::Serialize;
use std::fmt;

/// Which slot of the encoded instruction an operand flows into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperandEncoding {
    /// A fixed register named literally in the syntax.
    #[serde(rename = "none")]
    None,
    /// Not written in the assembly source, but still part of the UID.
    #[serde(rename = "implicit")]
    Implicit,
    #[serde(rename = "modrm-reg")]
    ModRmReg,
    #[serde(rename = "modrm-rm")]
    ModRmRm,
    #[serde(rename = "opcode-plus-reg")]
    OpcodePlusReg,
    #[serde(rename = "x87-stack-index-in-opcode")]
    StackIndex,
    #[serde(rename = "vex-vvvv")]
    VexVvvv,
    #[serde(rename = "vex-is4")]
    VexIs4,
    #[serde(rename = "sib")]
    Sib,
    #[serde(rename = "vsib")]
    Vsib,
    #[serde(rename = "displacement")]
    Displacement,
    #[serde(rename = "code-offset")]
    CodeOffset,
    #[serde(rename = "immediate")]
    Immediate,
}

/// The semantic category of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperandType {
    Register,
    StackIndex,
    StringDestinationMemory,
    StringSourceMemory,
    Memory,
    MemoryOffset,
    RelativeAddress,
    FarPointer,
    SignedImmediate,
    UnsignedImmediate,
}

/// One operand of an instruction form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operand {
    /// The syntactic name from the manual, after splitting (`m32`, not
    /// `r/m32`).
    pub name: String,
    /// The rendered syntax, including EVEX decorations such as `{k1}{z}`.
    pub syntax: String,
    /// The operand's contribution to the form UID (`M32`).
    pub uid: String,
    pub encoding: OperandEncoding,
    #[serde(rename = "type")]
    pub operand_type: OperandType,
    /// Width in bits, 0 where not meaningful.
    pub bits: u16,
    /// The concrete registers this operand can resolve to. Non-empty for
    /// every register-typed operand.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub registers: Vec<RegId>,
}

impl Operand {
    pub fn is_implicit(&self) -> bool {
        self.encoding == OperandEncoding::Implicit
    }
}

/// The EVEX tuple type, which drives 8-bit displacement compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TupleType {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "full")]
    Full,
    #[serde(rename = "half")]
    Half,
    #[serde(rename = "full-mem")]
    FullMem,
    #[serde(rename = "tuple1-scalar")]
    Tuple1Scalar,
    #[serde(rename = "tuple1-fixed")]
    Tuple1Fixed,
    #[serde(rename = "tuple2")]
    Tuple2,
    #[serde(rename = "tuple4")]
    Tuple4,
    #[serde(rename = "tuple8")]
    Tuple8,
    #[serde(rename = "half-mem")]
    HalfMem,
    #[serde(rename = "quarter-mem")]
    QuarterMem,
    #[serde(rename = "eighth-mem")]
    EighthMem,
    #[serde(rename = "mem128")]
    Mem128,
    #[serde(rename = "movddup")]
    MovDdup,
}

impl Default for TupleType {
    fn default() -> TupleType {
        TupleType::None
    }
}

impl TupleType {
    /// Recognises both the long manual spellings (`Tuple1 Scalar`) and the
    /// abbreviated ones used by older editions (`T1S`, `FVM`, ...).
    pub fn from_manual(s: &str) -> Option<TupleType> {
        Some(match s.trim() {
            "" | "None" | "NA" | "N/A" => TupleType::None,
            "Full" | "FV" => TupleType::Full,
            "Half" | "HV" => TupleType::Half,
            "Full Mem" | "FVM" => TupleType::FullMem,
            "Tuple1 Scalar" | "T1S" => TupleType::Tuple1Scalar,
            "Tuple1 Fixed" | "T1F" => TupleType::Tuple1Fixed,
            "Tuple2" | "T2" => TupleType::Tuple2,
            "Tuple4" | "T4" => TupleType::Tuple4,
            "Tuple8" | "T8" => TupleType::Tuple8,
            "Half Mem" | "HVM" => TupleType::HalfMem,
            "Quarter Mem" | "QVM" => TupleType::QuarterMem,
            "Eighth Mem" | "OVM" => TupleType::EighthMem,
            "Mem128" | "M128" => TupleType::Mem128,
            "MOVDDUP" | "DUP" => TupleType::MovDdup,
            _ => return None,
        })
    }

    /// The displacement-compression granularity N in bytes, per the
    /// Intel SDM §2.6.5.
    ///
    /// `vector_bits` is the encoding's vector size, `input_bits` is 64
    /// when EVEX.W is set and 32 otherwise, and `data_bits` is the form's
    /// data-operation size (used only by `tuple1-scalar`). Returns `None`
    /// for combinations the SDM does not define, such as broadcast on a
    /// non-broadcast tuple.
    pub fn displacement_compression(
        self,
        vector_bits: u16,
        input_bits: u16,
        broadcast: bool,
        data_bits: u16,
    ) -> Option<u16> {
        if broadcast && !matches!(self, TupleType::None | TupleType::Full | TupleType::Half) {
            return None;
        }
        Some(match self {
            TupleType::None => 1,
            TupleType::Full => {
                if broadcast {
                    input_bits / 8
                } else {
                    vector_bits / 8
                }
            }
            TupleType::Half => {
                if broadcast {
                    4
                } else {
                    vector_bits / 16
                }
            }
            TupleType::FullMem => vector_bits / 8,
            TupleType::Tuple1Scalar => data_bits / 8,
            TupleType::Tuple1Fixed => input_bits / 8,
            TupleType::Tuple2 => input_bits / 4,
            TupleType::Tuple4 => input_bits / 2,
            TupleType::Tuple8 => input_bits,
            TupleType::HalfMem => vector_bits / 16,
            TupleType::QuarterMem => vector_bits / 32,
            TupleType::EighthMem => vector_bits / 64,
            TupleType::Mem128 => 16,
            TupleType::MovDdup => match vector_bits {
                128 => 8,
                256 => 32,
                512 => 64,
                _ => return None,
            },
        })
    }
}

impl TupleType {
    /// The canonical name used by the emitted database.
    pub fn name(self) -> &'static str {
        match self {
            TupleType::None => "none",
            TupleType::Full => "full",
            TupleType::Half => "half",
            TupleType::FullMem => "full-mem",
            TupleType::Tuple1Scalar => "tuple1-scalar",
            TupleType::Tuple1Fixed => "tuple1-fixed",
            TupleType::Tuple2 => "tuple2",
            TupleType::Tuple4 => "tuple4",
            TupleType::Tuple8 => "tuple8",
            TupleType::HalfMem => "half-mem",
            TupleType::QuarterMem => "quarter-mem",
            TupleType::EighthMem => "eighth-mem",
            TupleType::Mem128 => "mem128",
            TupleType::MovDdup => "movddup",
        }
    }
}

impl fmt::Display for TupleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One canonical instruction form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    /// The manual page the form was extracted from, 0 for injected forms.
    pub page: u32,
    /// Lower-case mnemonic, with a `-far` suffix on the far control-flow
    /// variants.
    pub mnemonic: String,
    /// Process-unique identifier, always a valid identifier.
    pub uid: String,
    /// The Intel syntax as printed in the manual.
    pub syntax: String,
    pub encoding: Encoding,
    pub tuple_type: TupleType,
    /// Minimum number of arguments accepted in assembly source.
    pub min_args: u8,
    /// Maximum number of arguments, implicit operands included.
    pub max_args: u8,
    pub operands: [Option<Operand>; 4],
    pub mode64: bool,
    pub mode32: bool,
    pub mode16: bool,
    /// CPUID feature flags gating the form.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cpuid: Vec<String>,
    /// The form belongs to an operand-size-override family.
    pub operand_size: bool,
    pub address_size: bool,
    /// Data-operation size in bits, 0 when not meaningful.
    pub data_size: u16,
}

impl Instruction {
    /// Operands in slot order.
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.operands.iter().filter_map(|op| op.as_ref())
    }

    /// Non-implicit operands, the ones written in assembly source.
    pub fn explicit_operands(&self) -> impl Iterator<Item = &Operand> {
        self.operands().filter(|op| !op.is_implicit())
    }

    pub fn valid_in(&self, mode: crate::CpuMode) -> bool {
        match mode {
            crate::CpuMode::Real16 => self.mode16,
            crate::CpuMode::Protected32 => self.mode32,
            crate::CpuMode::Long64 => self.mode64,
        }
    }

    /// Derives the unique identifier for this form from its mnemonic,
    /// operands and mandatory prefixes.
    pub fn derive_uid(&self) -> String {
        let mut uid = self.mnemonic.to_ascii_uppercase().replace('-', "_");

        for operand in self.operands().filter(|op| !op.is_implicit()) {
            uid.push('_');
            uid.push_str(&operand.uid);
            // The broadcast memory operands exist at several vector sizes
            // with otherwise identical operand lists.
            if operand.name.ends_with("bcst") {
                let vector = self.encoding.vector_size().unwrap_or(0);
                uid.push_str(&vector.to_string());
            }
        }

        if self.encoding.evex {
            uid.push_str("_EVEX");
            uid.push_str(&self.encoding.vector_size().unwrap_or(0).to_string());
        } else if self.encoding.vex {
            uid.push_str("_VEX");
        } else if self.encoding.rex {
            uid.push_str("_REX");
        }

        // The same POP FS/GS encoding exists once per stack width; the
        // widths are told apart by their declared modes.
        if self.mnemonic == "pop"
            && self
                .operands()
                .next()
                .map_or(false, |op| matches!(op.name.as_str(), "FS" | "GS"))
        {
            uid.push_str(&self.stack_size_suffix());
        }

        // Same encodings, different semantics by CPU mode.
        if matches!(self.mnemonic.as_str(), "bndmov" | "vmload" | "vmrun" | "vmsave") {
            uid.push_str(if self.mode64 { "64" } else { "32" });
        }

        uid
    }

    fn stack_size_suffix(&self) -> String {
        if self.data_size > 0 {
            self.data_size.to_string()
        } else if self.mode64 {
            "64".to_string()
        } else if self.mode32 {
            "32".to_string()
        } else {
            "16".to_string()
        }
    }
}

/// True when `s` is usable as an identifier: letters, digits and
/// underscores, not starting with a digit.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::RegId;

    fn register_operand(name: &str, uid: &str, bits: u16, encoding: OperandEncoding) -> Operand {
        Operand {
            name: name.to_string(),
            syntax: name.to_string(),
            uid: uid.to_string(),
            encoding,
            operand_type: OperandType::Register,
            bits,
            registers: vec![RegId::RAX],
        }
    }

    fn form(mnemonic: &str, syntax: &str) -> Instruction {
        Instruction {
            page: 0,
            mnemonic: mnemonic.to_string(),
            uid: String::new(),
            syntax: syntax.to_string(),
            encoding: Encoding::default(),
            tuple_type: TupleType::None,
            min_args: 0,
            max_args: 0,
            operands: [None, None, None, None],
            mode64: true,
            mode32: true,
            mode16: true,
            cpuid: Vec::new(),
            operand_size: false,
            address_size: false,
            data_size: 0,
        }
    }

    #[test]
    fn uid_for_rex_form() {
        let mut mov = form("mov", "MOV r64, r64");
        mov.encoding = Encoding::parse("REX.W 89 /r").unwrap();
        mov.operands[0] = Some(register_operand(
            "r64",
            "R64",
            64,
            OperandEncoding::ModRmRm,
        ));
        mov.operands[1] = Some(register_operand(
            "r64",
            "R64",
            64,
            OperandEncoding::ModRmReg,
        ));
        mov.mode32 = false;
        mov.mode16 = false;
        assert_eq!(mov.derive_uid(), "MOV_R64_R64_REX");
    }

    #[test]
    fn uid_skips_implicit_operands() {
        let mut mul = form("mul", "MUL r/m8");
        mul.encoding = Encoding::parse("F6 /4").unwrap();
        mul.operands[0] = Some(register_operand(
            "<AX>",
            "AX",
            16,
            OperandEncoding::Implicit,
        ));
        mul.operands[1] = Some(register_operand("r8", "R8", 8, OperandEncoding::ModRmRm));
        assert_eq!(mul.derive_uid(), "MUL_R8");
    }

    #[test]
    fn uid_appends_vector_size_for_evex() {
        let mut vadd = form("vaddps", "VADDPS zmm1, zmm2, zmm3");
        vadd.encoding = Encoding::parse("EVEX.512.0F.W0 58 /r").unwrap();
        vadd.operands[0] = Some(register_operand(
            "zmm1",
            "ZMM",
            512,
            OperandEncoding::ModRmReg,
        ));
        assert_eq!(vadd.derive_uid(), "VADDPS_ZMM_EVEX512");
    }

    #[test]
    fn uid_disambiguates_by_mode() {
        let mut vmrun = form("vmrun", "VMRUN");
        vmrun.encoding = Encoding::parse("0F 01 D8").unwrap();
        vmrun.mode32 = false;
        vmrun.mode16 = false;
        assert_eq!(vmrun.derive_uid(), "VMRUN64");
    }

    #[test]
    fn identifier_validation() {
        assert!(is_valid_identifier("MOV_R64_R64_REX"));
        assert!(is_valid_identifier("_X"));
        assert!(!is_valid_identifier("1MOV"));
        assert!(!is_valid_identifier("MOV R64"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn displacement_compression_table() {
        use TupleType::*;
        // (tuple, vector, input, broadcast, data, expected)
        let cases: &[(TupleType, u16, u16, bool, u16, Option<u16>)] = &[
            (None, 512, 32, false, 0, Some(1)),
            (Full, 512, 32, false, 0, Some(64)),
            (Full, 128, 32, false, 0, Some(16)),
            (Full, 512, 32, true, 0, Some(4)),
            (Full, 512, 64, true, 0, Some(8)),
            (Half, 512, 32, false, 0, Some(32)),
            (Half, 256, 32, true, 0, Some(4)),
            (FullMem, 256, 32, false, 0, Some(32)),
            (Tuple1Scalar, 128, 32, false, 64, Some(8)),
            (Tuple1Fixed, 128, 64, false, 0, Some(8)),
            (Tuple2, 128, 32, false, 0, Some(8)),
            (Tuple4, 256, 64, false, 0, Some(32)),
            (Tuple8, 512, 32, false, 0, Some(32)),
            (HalfMem, 512, 32, false, 0, Some(32)),
            (QuarterMem, 512, 32, false, 0, Some(16)),
            (EighthMem, 512, 32, false, 0, Some(8)),
            (Mem128, 512, 32, false, 0, Some(16)),
            (MovDdup, 128, 32, false, 0, Some(8)),
            (MovDdup, 256, 32, false, 0, Some(32)),
            (MovDdup, 512, 32, false, 0, Some(64)),
            (FullMem, 512, 32, true, 0, Option::None),
            (Tuple2, 128, 32, true, 0, Option::None),
        ];
        for &(tuple, vector, input, broadcast, data, expected) in cases {
            assert_eq!(
                tuple.displacement_compression(vector, input, broadcast, data),
                expected,
                "{:?} v{} i{} b{}",
                tuple,
                vector,
                input,
                broadcast
            );
        }
    }

    #[test]
    fn tuple_type_spellings() {
        assert_eq!(TupleType::from_manual("Full"), Some(TupleType::Full));
        assert_eq!(TupleType::from_manual("FV"), Some(TupleType::Full));
        assert_eq!(
            TupleType::from_manual("Tuple1 Scalar"),
            Some(TupleType::Tuple1Scalar)
        );
        assert_eq!(TupleType::from_manual("bogus"), Option::None);
    }
}
