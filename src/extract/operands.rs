//! The operand-syntax table.
//!
//! Every operand spelling that can appear in the database (after the
//! normalisation passes and `r/m` splitting) has one entry here carrying
//! its UID fragment, its encoding role where the operand itself fixes it,
//! its type and width, the concrete registers it can resolve to, and its
//! selection priority. A spelling without an entry is a build-time error.
//!
//! Priorities order fixed registers before general-purpose register
//! classes before memory forms; relative and immediate operands follow.

use crate::instruction::{OperandEncoding, OperandType};
use crate::instruction::{OperandEncoding as E, OperandType as T};
use crate::register::{self, RegId};

pub struct OperandSpec {
    pub name: &'static str,
    pub uid: &'static str,
    /// Role fixed by the operand itself; `None` defers to the Op/En cell.
    pub role: Option<OperandEncoding>,
    pub operand_type: OperandType,
    pub bits: u16,
    pub registers: &'static [RegId],
    pub priority: u16,
}

macro_rules! spec {
    ($name:literal, $uid:literal, $role:expr, $type_:expr, $bits:literal, $regs:expr, $prio:literal) => {
        OperandSpec {
            name: $name,
            uid: $uid,
            role: $role,
            operand_type: $type_,
            bits: $bits,
            registers: $regs,
            priority: $prio,
        }
    };
}

const NONE: &[RegId] = &[];

#[rustfmt::skip]
pub static TABLE: &[OperandSpec] = &[
    // Constant operands.
    spec!("1", "1", Some(E::None), T::UnsignedImmediate, 8, NONE, 10),

    // Fixed general-purpose registers.
    spec!("AL",  "AL",  Some(E::None), T::Register, 8,  &[RegId::AL],  12),
    spec!("CL",  "CL",  Some(E::None), T::Register, 8,  &[RegId::CL],  12),
    spec!("AX",  "AX",  Some(E::None), T::Register, 16, &[RegId::AX],  12),
    spec!("DX",  "DX",  Some(E::None), T::Register, 16, &[RegId::DX],  12),
    spec!("EAX", "EAX", Some(E::None), T::Register, 32, &[RegId::EAX], 12),
    spec!("EBX", "EBX", Some(E::None), T::Register, 32, &[RegId::EBX], 12),
    spec!("ECX", "ECX", Some(E::None), T::Register, 32, &[RegId::ECX], 12),
    spec!("EDX", "EDX", Some(E::None), T::Register, 32, &[RegId::EDX], 12),
    spec!("RAX", "RAX", Some(E::None), T::Register, 64, &[RegId::RAX], 12),

    // Fixed segment registers (PUSH FS and friends).
    spec!("CS", "CS", Some(E::None), T::Register, 16, &[RegId::CS], 13),
    spec!("DS", "DS", Some(E::None), T::Register, 16, &[RegId::DS], 13),
    spec!("ES", "ES", Some(E::None), T::Register, 16, &[RegId::ES], 13),
    spec!("SS", "SS", Some(E::None), T::Register, 16, &[RegId::SS], 13),
    spec!("FS", "FS", Some(E::None), T::Register, 16, &[RegId::FS], 13),
    spec!("GS", "GS", Some(E::None), T::Register, 16, &[RegId::GS], 13),

    // Fixed x87, XMM and control registers.
    spec!("ST",    "ST",   Some(E::None), T::Register, 80,  &[RegId::ST],   14),
    spec!("ST(0)", "ST0",  Some(E::None), T::Register, 80,  &[RegId::ST0],  14),
    spec!("XMM0",  "XMM0", Some(E::None), T::Register, 128, &[RegId::XMM0], 14),
    spec!("CR8",   "CR8",  Some(E::None), T::Register, 64,  &[RegId::CR8],  14),

    // Implicit operands. Unspoken in source, still part of the UID.
    spec!("<AL>",      "AL",     Some(E::Implicit), T::Register, 8,   &[RegId::AL],     15),
    spec!("<AX>",      "AX",     Some(E::Implicit), T::Register, 16,  &[RegId::AX],     15),
    spec!("<EAX>",     "EAX",    Some(E::Implicit), T::Register, 32,  &[RegId::EAX],    15),
    spec!("<RAX>",     "RAX",    Some(E::Implicit), T::Register, 64,  &[RegId::RAX],    15),
    spec!("<DX>",      "DX",     Some(E::Implicit), T::Register, 16,  &[RegId::DX],     15),
    spec!("<ECX>",     "ECX",    Some(E::Implicit), T::Register, 32,  &[RegId::ECX],    15),
    spec!("<EDX>",     "EDX",    Some(E::Implicit), T::Register, 32,  &[RegId::EDX],    15),
    spec!("<XMM0>",    "XMM0",   Some(E::Implicit), T::Register, 128, &[RegId::XMM0],   15),
    spec!("<DX:AX>",   "DXAX",   Some(E::Implicit), T::Register, 32,  &[RegId::DXAX],   15),
    spec!("<EDX:EAX>", "EDXEAX", Some(E::Implicit), T::Register, 64,  &[RegId::EDXEAX], 15),
    spec!("<ECX:EBX>", "ECXEBX", Some(E::Implicit), T::Register, 64,  &[RegId::ECXEBX], 15),
    spec!("<RDX:RAX>", "RDXRAX", Some(E::Implicit), T::Register, 128, &[RegId::RDXRAX], 15),
    spec!("<RCX:RBX>", "RCXRBX", Some(E::Implicit), T::Register, 128, &[RegId::RCXRBX], 15),

    // General-purpose register classes.
    spec!("r8",   "R8",  None, T::Register, 8,  register::REGISTERS_8BIT_GENERAL_PURPOSE,  30),
    spec!("r16",  "R16", None, T::Register, 16, register::REGISTERS_16BIT_GENERAL_PURPOSE, 31),
    spec!("r32",  "R32", None, T::Register, 32, register::REGISTERS_32BIT_GENERAL_PURPOSE, 32),
    spec!("r64",  "R64", None, T::Register, 64, register::REGISTERS_64BIT_GENERAL_PURPOSE, 33),
    spec!("r32a", "R32", None, T::Register, 32, register::REGISTERS_32BIT_GENERAL_PURPOSE, 32),
    spec!("r32b", "R32", None, T::Register, 32, register::REGISTERS_32BIT_GENERAL_PURPOSE, 32),
    spec!("r64a", "R64", None, T::Register, 64, register::REGISTERS_64BIT_GENERAL_PURPOSE, 33),
    spec!("r64b", "R64", None, T::Register, 64, register::REGISTERS_64BIT_GENERAL_PURPOSE, 33),

    // Segment / control / debug register classes.
    spec!("Sreg",    "SREG", None, T::Register, 16, register::REGISTERS_16BIT_SEGMENT, 34),
    spec!("CR0-CR7", "CR",   None, T::Register, 64, &[RegId::CR0, RegId::CR1, RegId::CR2,
        RegId::CR3, RegId::CR4, RegId::CR5, RegId::CR6, RegId::CR7], 35),
    spec!("DR0-DR7", "DR",   None, T::Register, 64, &[RegId::DR0, RegId::DR1, RegId::DR2,
        RegId::DR3, RegId::DR4, RegId::DR5, RegId::DR6, RegId::DR7], 35),

    // x87 stack index.
    spec!("ST(i)", "STI", Some(E::StackIndex), T::StackIndex, 80, register::REGISTERS_STACK_INDICES, 36),

    // MMX.
    spec!("mm",  "MM", None, T::Register, 64, register::REGISTERS_64BIT_MMX, 37),
    spec!("mm1", "MM", None, T::Register, 64, register::REGISTERS_64BIT_MMX, 37),
    spec!("mm2", "MM", None, T::Register, 64, register::REGISTERS_64BIT_MMX, 37),

    // Opmask.
    spec!("k1", "K", None, T::Register, 64, register::REGISTERS_OPMASK, 38),
    spec!("k2", "K", None, T::Register, 64, register::REGISTERS_OPMASK, 38),
    spec!("k3", "K", None, T::Register, 64, register::REGISTERS_OPMASK, 38),

    // Bounds.
    spec!("bnd",  "BND", None, T::Register, 128, register::REGISTERS_BOUNDS, 39),
    spec!("bnd1", "BND", None, T::Register, 128, register::REGISTERS_BOUNDS, 39),
    spec!("bnd2", "BND", None, T::Register, 128, register::REGISTERS_BOUNDS, 39),
    spec!("bnd3", "BND", None, T::Register, 128, register::REGISTERS_BOUNDS, 39),

    // Vector registers.
    spec!("xmm",  "XMM", None, T::Register, 128, register::REGISTERS_128BIT_XMM, 40),
    spec!("xmm1", "XMM", None, T::Register, 128, register::REGISTERS_128BIT_XMM, 40),
    spec!("xmm2", "XMM", None, T::Register, 128, register::REGISTERS_128BIT_XMM, 40),
    spec!("xmm3", "XMM", None, T::Register, 128, register::REGISTERS_128BIT_XMM, 40),
    spec!("xmm4", "XMM", None, T::Register, 128, register::REGISTERS_128BIT_XMM, 40),
    spec!("ymm1", "YMM", None, T::Register, 256, register::REGISTERS_256BIT_YMM, 41),
    spec!("ymm2", "YMM", None, T::Register, 256, register::REGISTERS_256BIT_YMM, 41),
    spec!("ymm3", "YMM", None, T::Register, 256, register::REGISTERS_256BIT_YMM, 41),
    spec!("ymm4", "YMM", None, T::Register, 256, register::REGISTERS_256BIT_YMM, 41),
    spec!("zmm1", "ZMM", None, T::Register, 512, register::REGISTERS_512BIT_ZMM, 42),
    spec!("zmm2", "ZMM", None, T::Register, 512, register::REGISTERS_512BIT_ZMM, 42),
    spec!("zmm3", "ZMM", None, T::Register, 512, register::REGISTERS_512BIT_ZMM, 42),

    // AMX tiles.
    spec!("tmm1", "TMM", None, T::Register, 0, register::REGISTERS_TMM, 43),
    spec!("tmm2", "TMM", None, T::Register, 0, register::REGISTERS_TMM, 43),
    spec!("tmm3", "TMM", None, T::Register, 0, register::REGISTERS_TMM, 43),

    // Memory operands.
    spec!("m",    "M",    None, T::Memory, 0,   NONE, 50),
    spec!("mem",  "M",    None, T::Memory, 0,   NONE, 50),
    spec!("m8",   "M8",   None, T::Memory, 8,   NONE, 51),
    spec!("m16",  "M16",  None, T::Memory, 16,  NONE, 52),
    spec!("m32",  "M32",  None, T::Memory, 32,  NONE, 53),
    spec!("m64",  "M64",  None, T::Memory, 64,  NONE, 54),
    spec!("m128", "M128", None, T::Memory, 128, NONE, 55),
    spec!("m256", "M256", None, T::Memory, 256, NONE, 56),
    spec!("m512", "M512", None, T::Memory, 512, NONE, 57),
    spec!("mib",  "MIB",  None, T::Memory, 0,   NONE, 58),

    // Multi-word memory operands that never split.
    spec!("m16&16",     "M16AND16",  None, T::Memory, 32,  NONE, 59),
    spec!("m16&32",     "M16AND32",  None, T::Memory, 48,  NONE, 59),
    spec!("m32&32",     "M32AND32",  None, T::Memory, 64,  NONE, 59),
    spec!("m16&64",     "M16AND64",  None, T::Memory, 80,  NONE, 59),
    spec!("m2byte",     "M2BYTE",    None, T::Memory, 16,  NONE, 59),
    spec!("m14/28byte", "M14BYTE",   None, T::Memory, 0,   NONE, 59),
    spec!("m94/108byte","M94BYTE",   None, T::Memory, 0,   NONE, 59),
    spec!("m512byte",   "M512BYTE",  None, T::Memory, 0,   NONE, 59),

    // x87 memory operands.
    spec!("m16int", "M16INT", None, T::Memory, 16, NONE, 60),
    spec!("m32int", "M32INT", None, T::Memory, 32, NONE, 60),
    spec!("m64int", "M64INT", None, T::Memory, 64, NONE, 60),
    spec!("m32fp",  "M32FP",  None, T::Memory, 32, NONE, 60),
    spec!("m64fp",  "M64FP",  None, T::Memory, 64, NONE, 60),
    spec!("m80fp",  "M80FP",  None, T::Memory, 80, NONE, 60),
    spec!("m80bcd", "M80BCD", None, T::Memory, 80, NONE, 60),
    spec!("m80dec", "M80DEC", None, T::Memory, 80, NONE, 60),

    // Far-pointer memory operands.
    spec!("m16:16", "M16_16", None, T::FarPointer, 32, NONE, 61),
    spec!("m16:32", "M16_32", None, T::FarPointer, 48, NONE, 61),
    spec!("m16:64", "M16_64", None, T::FarPointer, 80, NONE, 61),

    // Vector-indexed memory. The registers are the legal index registers.
    spec!("vm32x", "VM32X", Some(E::Vsib), T::Memory, 32, register::REGISTERS_128BIT_XMM, 62),
    spec!("vm32y", "VM32Y", Some(E::Vsib), T::Memory, 32, register::REGISTERS_256BIT_YMM, 62),
    spec!("vm32z", "VM32Z", Some(E::Vsib), T::Memory, 32, register::REGISTERS_512BIT_ZMM, 62),
    spec!("vm64x", "VM64X", Some(E::Vsib), T::Memory, 64, register::REGISTERS_128BIT_XMM, 62),
    spec!("vm64y", "VM64Y", Some(E::Vsib), T::Memory, 64, register::REGISTERS_256BIT_YMM, 62),
    spec!("vm64z", "VM64Z", Some(E::Vsib), T::Memory, 64, register::REGISTERS_512BIT_ZMM, 62),

    // Broadcast memory operands.
    spec!("m16bcst", "M16BCST", None, T::Memory, 16, NONE, 70),
    spec!("m32bcst", "M32BCST", None, T::Memory, 32, NONE, 70),
    spec!("m64bcst", "M64BCST", None, T::Memory, 64, NONE, 70),

    // Memory offsets (the MOV moffs forms).
    spec!("moffs8",  "MOFFS8",  Some(E::Displacement), T::MemoryOffset, 8,  NONE, 80),
    spec!("moffs16", "MOFFS16", Some(E::Displacement), T::MemoryOffset, 16, NONE, 80),
    spec!("moffs32", "MOFFS32", Some(E::Displacement), T::MemoryOffset, 32, NONE, 80),
    spec!("moffs64", "MOFFS64", Some(E::Displacement), T::MemoryOffset, 64, NONE, 80),

    // Code offsets.
    spec!("rel8",  "REL8",  Some(E::CodeOffset), T::RelativeAddress, 8,  NONE, 85),
    spec!("rel16", "REL16", Some(E::CodeOffset), T::RelativeAddress, 16, NONE, 86),
    spec!("rel32", "REL32", Some(E::CodeOffset), T::RelativeAddress, 32, NONE, 87),

    // Far pointers given as immediates.
    spec!("ptr16:16", "PTR16_16", Some(E::CodeOffset), T::FarPointer, 32, NONE, 88),
    spec!("ptr16:32", "PTR16_32", Some(E::CodeOffset), T::FarPointer, 48, NONE, 88),

    // Immediates.
    spec!("imm8",  "IMM8",  Some(E::Immediate), T::SignedImmediate, 8,  NONE, 100),
    spec!("imm16", "IMM16", Some(E::Immediate), T::SignedImmediate, 16, NONE, 101),
    spec!("imm32", "IMM32", Some(E::Immediate), T::SignedImmediate, 32, NONE, 102),
    spec!("imm64", "IMM64", Some(E::Immediate), T::SignedImmediate, 64, NONE, 103),
];

/// Operand names containing `/` that are single operands, not split
/// alternatives.
pub const NO_SPLIT: &[&str] = &["m14/28byte", "m94/108byte"];

/// Looks an operand spelling up.
pub fn find(name: &str) -> Option<&'static OperandSpec> {
    TABLE.iter().find(|spec| spec.name == name)
}

/// The selection priority of an operand spelling, if covered.
pub fn operand_priority(name: &str) -> Option<u16> {
    find(name).map(|spec| spec.priority)
}
