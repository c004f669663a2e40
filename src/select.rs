//! Form selection: the total order over instruction forms and the runtime
//! lookup index the assembler drives.

use crate::extract::operands::operand_priority;
use crate::instruction::{Instruction, Operand, OperandType};
use crate::register::RegId;
use crate::CpuMode;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// An operand syntax with no entry in the priority table. Raised at build
/// time; the table must cover everything the database contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncoveredSyntax {
    pub uid: String,
    pub operand: String,
}

impl fmt::Display for UncoveredSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operand `{}` of `{}` has no selection priority",
            self.operand, self.uid
        )
    }
}

impl std::error::Error for UncoveredSyntax {}

/// Total order over instruction forms: mnemonic, operand count, operand
/// priorities, then non-REX before REX, non-REX.W before REX.W, non-EVEX
/// before EVEX, non-VEX before VEX, and smaller vector sizes first.
pub fn compare_forms(a: &Instruction, b: &Instruction) -> Ordering {
    a.mnemonic
        .cmp(&b.mnemonic)
        .then_with(|| a.max_args.cmp(&b.max_args))
        .then_with(|| {
            for (x, y) in a.operands.iter().zip(b.operands.iter()) {
                let ord = priority_of(x.as_ref()).cmp(&priority_of(y.as_ref()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        })
        .then_with(|| a.encoding.rex.cmp(&b.encoding.rex))
        .then_with(|| a.encoding.rex_w.cmp(&b.encoding.rex_w))
        .then_with(|| a.encoding.evex.cmp(&b.encoding.evex))
        .then_with(|| a.encoding.vex.cmp(&b.encoding.vex))
        .then_with(|| {
            let va = a.encoding.vector_size().unwrap_or(0);
            let vb = b.encoding.vector_size().unwrap_or(0);
            va.cmp(&vb)
        })
        .then_with(|| a.uid.cmp(&b.uid))
}

fn priority_of(operand: Option<&Operand>) -> u16 {
    match operand {
        // Empty slots order before any populated slot.
        None => 0,
        Some(op) => operand_priority(&op.name).unwrap_or(u16::MAX),
    }
}

/// Verifies priority-table coverage, then sorts `forms` into the canonical
/// selection order.
pub fn sort_forms(forms: &mut [Instruction]) -> Result<(), UncoveredSyntax> {
    for form in forms.iter() {
        for operand in form.operands() {
            if operand_priority(&operand.name).is_none() {
                return Err(UncoveredSyntax {
                    uid: form.uid.clone(),
                    operand: operand.name.clone(),
                });
            }
        }
    }
    forms.sort_by(compare_forms);
    Ok(())
}

/// An actual argument of a source expression, as seen by the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Register(RegId),
    /// A memory reference of the given width in bits (0 when unsized).
    Memory { bits: u16 },
    Immediate(i64),
    /// A code label or absolute target, of the given reachable width.
    Address { bits: u16 },
    FarPointer { bits: u16 },
}

/// No form accepted the source expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionError {
    pub mnemonic: String,
    /// The UIDs of every candidate that was tried, in selection order.
    pub tried: Vec<String>,
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tried.is_empty() {
            write!(f, "unknown mnemonic `{}`", self.mnemonic)
        } else {
            write!(
                f,
                "no form of `{}` accepts the given arguments; tried {}",
                self.mnemonic,
                self.tried.join(", ")
            )
        }
    }
}

impl std::error::Error for SelectionError {}

/// The immutable runtime index over the instruction database.
pub struct InstructionIndex {
    forms: Vec<Instruction>,
    by_mnemonic: HashMap<String, Vec<usize>>,
    by_uid: HashMap<String, usize>,
}

impl InstructionIndex {
    /// Builds the index. `forms` must already be in selection order (the
    /// order emitted by the database builder).
    pub fn new(forms: Vec<Instruction>) -> InstructionIndex {
        let mut by_mnemonic: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_uid = HashMap::new();
        for (i, form) in forms.iter().enumerate() {
            by_mnemonic.entry(form.mnemonic.clone()).or_default().push(i);
            by_uid.insert(form.uid.clone(), i);
        }
        InstructionIndex {
            forms,
            by_mnemonic,
            by_uid,
        }
    }

    pub fn forms(&self) -> &[Instruction] {
        &self.forms
    }

    pub fn by_uid(&self, uid: &str) -> Option<&Instruction> {
        self.by_uid.get(uid).map(|&i| &self.forms[i])
    }

    /// All forms of a mnemonic, in selection order.
    pub fn by_mnemonic<'a>(&'a self, mnemonic: &str) -> impl Iterator<Item = &'a Instruction> {
        self.by_mnemonic
            .get(mnemonic)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&i| &self.forms[i])
    }

    /// Selects the preferred form of `mnemonic` accepting `args` in `mode`
    /// with the CPU features in `features` available. Candidates are tried
    /// in the canonical sort order; the first match wins.
    pub fn select<'a>(
        &'a self,
        mnemonic: &str,
        args: &[Argument],
        mode: CpuMode,
        features: &HashSet<String>,
    ) -> Result<&'a Instruction, SelectionError> {
        let mut tried = Vec::new();
        for form in self.by_mnemonic(mnemonic) {
            if !form.valid_in(mode) {
                continue;
            }
            if !form.cpuid.iter().all(|f| features.contains(f)) {
                continue;
            }
            tried.push(form.uid.clone());
            if form_accepts(form, args, mode) {
                return Ok(form);
            }
        }
        Err(SelectionError {
            mnemonic: mnemonic.to_string(),
            tried,
        })
    }
}

fn form_accepts(form: &Instruction, args: &[Argument], mode: CpuMode) -> bool {
    let explicit: Vec<&Operand> = form.explicit_operands().collect();
    if explicit.len() != args.len() {
        return false;
    }
    explicit
        .iter()
        .zip(args.iter())
        .all(|(op, arg)| operand_accepts(op, arg, mode))
}

fn operand_accepts(operand: &Operand, arg: &Argument, mode: CpuMode) -> bool {
    match operand.operand_type {
        OperandType::Register | OperandType::StackIndex => match arg {
            Argument::Register(id) => {
                operand.registers.contains(id) && id.register().encodable_in(mode)
            }
            _ => false,
        },
        OperandType::Memory
        | OperandType::StringDestinationMemory
        | OperandType::StringSourceMemory => match arg {
            Argument::Memory { bits } => {
                *bits == 0 || operand.bits == 0 || *bits == operand.bits
            }
            _ => false,
        },
        OperandType::MemoryOffset => matches!(arg, Argument::Memory { .. } | Argument::Address { .. }),
        OperandType::RelativeAddress => match arg {
            Argument::Address { bits } => *bits <= operand.bits,
            Argument::Immediate(v) => immediate_fits_signed(*v, operand.bits),
            _ => false,
        },
        OperandType::FarPointer => match arg {
            Argument::FarPointer { bits } => *bits == 0 || *bits == operand.bits,
            _ => false,
        },
        OperandType::SignedImmediate => match arg {
            Argument::Immediate(v) => immediate_fits_signed(*v, operand.bits),
            _ => false,
        },
        OperandType::UnsignedImmediate => match arg {
            Argument::Immediate(v) => immediate_fits_unsigned(*v, operand.bits),
            _ => false,
        },
    }
}

fn immediate_fits_signed(value: i64, bits: u16) -> bool {
    if bits >= 64 {
        return true;
    }
    let half = 1i64 << (bits - 1);
    value >= -half && value < half
}

fn immediate_fits_unsigned(value: i64, bits: u16) -> bool {
    if bits >= 64 {
        return true;
    }
    value >= 0 && value < (1i64 << bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Encoding;
    use crate::instruction::{OperandEncoding, TupleType};
    use crate::register;

    fn operand(name: &str, uid: &str, bits: u16, registers: Vec<RegId>) -> Operand {
        Operand {
            name: name.to_string(),
            syntax: name.to_string(),
            uid: uid.to_string(),
            encoding: OperandEncoding::ModRmRm,
            operand_type: OperandType::Register,
            bits,
            registers,
        }
    }

    fn form(mnemonic: &str, uid: &str, encoding: &str, op: Operand) -> Instruction {
        let encoding = Encoding::parse(encoding).unwrap();
        let mode64_only = encoding.rex;
        Instruction {
            page: 1,
            mnemonic: mnemonic.to_string(),
            uid: uid.to_string(),
            syntax: String::new(),
            encoding,
            tuple_type: TupleType::None,
            min_args: 1,
            max_args: 1,
            operands: [Some(op), None, None, None],
            mode64: true,
            mode32: !mode64_only,
            mode16: !mode64_only,
            cpuid: Vec::new(),
            operand_size: false,
            address_size: false,
            data_size: 0,
        }
    }

    fn r32(uid: &str) -> Operand {
        operand(
            "r32",
            uid,
            32,
            register::REGISTERS_32BIT_GENERAL_PURPOSE.to_vec(),
        )
    }

    fn r64(uid: &str) -> Operand {
        operand(
            "r64",
            uid,
            64,
            register::REGISTERS_64BIT_GENERAL_PURPOSE.to_vec(),
        )
    }

    #[test]
    fn non_rex_sorts_before_rex() {
        let plain = form("inc", "INC_R32", "FF /0", r32("R32"));
        let rex = form("inc", "INC_R64_REX", "REX.W FF /0", r64("R64"));
        let mut forms = vec![rex.clone(), plain.clone()];
        sort_forms(&mut forms).unwrap();
        assert_eq!(forms[0].uid, "INC_R32");
        assert_eq!(forms[1].uid, "INC_R64_REX");

        // Total order: sorting again does not change the sequence.
        let first: Vec<String> = forms.iter().map(|f| f.uid.clone()).collect();
        sort_forms(&mut forms).unwrap();
        let second: Vec<String> = forms.iter().map(|f| f.uid.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn mode_filtering_excludes_64bit_registers() {
        let plain = form("inc", "INC_R32", "FF /0", r32("R32"));
        let rex = form("inc", "INC_R64_REX", "REX.W FF /0", r64("R64"));
        let index = InstructionIndex::new(vec![plain, rex]);
        let features = HashSet::new();

        let rax = [Argument::Register(RegId::RAX)];
        assert!(index
            .select("inc", &rax, CpuMode::Protected32, &features)
            .is_err());
        assert_eq!(
            index
                .select("inc", &rax, CpuMode::Long64, &features)
                .unwrap()
                .uid,
            "INC_R64_REX"
        );

        let eax = [Argument::Register(RegId::EAX)];
        assert_eq!(
            index
                .select("inc", &eax, CpuMode::Protected32, &features)
                .unwrap()
                .uid,
            "INC_R32"
        );
    }

    #[test]
    fn selection_error_lists_tried_forms() {
        let plain = form("inc", "INC_R32", "FF /0", r32("R32"));
        let index = InstructionIndex::new(vec![plain]);
        let err = index
            .select(
                "inc",
                &[Argument::Immediate(1)],
                CpuMode::Protected32,
                &HashSet::new(),
            )
            .unwrap_err();
        assert_eq!(err.tried, vec!["INC_R32".to_string()]);

        let err = index
            .select("bogus", &[], CpuMode::Protected32, &HashSet::new())
            .unwrap_err();
        assert!(err.tried.is_empty());
    }

    #[test]
    fn cpuid_gating() {
        let mut gated = form("foo", "FOO_R32", "0F 0B /r", r32("R32"));
        gated.cpuid = vec!["AVX2".to_string()];
        let index = InstructionIndex::new(vec![gated]);

        let args = [Argument::Register(RegId::EAX)];
        assert!(index
            .select("foo", &args, CpuMode::Protected32, &HashSet::new())
            .is_err());

        let mut features = HashSet::new();
        features.insert("AVX2".to_string());
        assert!(index
            .select("foo", &args, CpuMode::Protected32, &features)
            .is_ok());
    }

    #[test]
    fn immediate_ranges() {
        assert!(immediate_fits_signed(-128, 8));
        assert!(!immediate_fits_signed(128, 8));
        assert!(immediate_fits_unsigned(255, 8));
        assert!(!immediate_fits_unsigned(-1, 8));
        assert!(immediate_fits_signed(i64::MIN, 64));
    }
}
