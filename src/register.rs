//! The x86 register catalogue.
//!
//! Registers are stored in one flat immutable table and referred to by
//! [`RegId`] indices. The parent graph (writes to a narrow register view
//! affect its wider containers) is stored as index lists so that the table
//! has no ownership cycles and registers stay cheaply copyable.

use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

use crate::CpuMode;

/// The class a register belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegisterClass {
    GeneralPurpose,
    Segment,
    InstructionPointer,
    X87Stack,
    Control,
    Debug,
    Opmask,
    Bounds,
    Mmx,
    Tmm,
    Xmm,
    Ymm,
    Zmm,
    RegisterPair,
    Float,
}

/// One register in the catalogue.
///
/// `reg` is the 5-bit number used when the register appears in ModR/M.reg,
/// ModR/M.rm (register form) or embedded in the opcode. `addr` is the 5-bit
/// number used when the register is a base or index of a memory operand.
#[derive(Debug)]
pub struct Register {
    name: &'static str,
    aliases: &'static [&'static str],
    class: RegisterClass,
    bits: u16,
    reg: u8,
    addr: u8,
    min_mode: u16,
    evex_only: bool,
    parents: &'static [RegId],
}

/// The bits needed to place a register into ModR/M, SIB or an opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterForm {
    /// The register is only reachable through an EVEX prefix.
    pub evex: bool,
    /// A REX prefix must be present (registers 8-15, or SPL/BPL/SIL/DIL).
    pub rex: bool,
    /// The value of the REX extension bit (bit 3 of the register number).
    pub rex_field: bool,
    /// The low three bits of the register number.
    pub code: u8,
}

impl Register {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        self.aliases
    }

    pub fn class(&self) -> RegisterClass {
        self.class
    }

    /// Register width in bits, where meaningful.
    pub fn bits(&self) -> u16 {
        self.bits
    }

    /// The 5-bit number used for ModR/M.reg and opcode embedding.
    pub fn reg_value(&self) -> u8 {
        self.reg
    }

    /// The 5-bit number used for memory-operand base and index fields.
    pub fn addr_value(&self) -> u8 {
        self.addr
    }

    /// Wider registers that alias this one's storage.
    pub fn parents(&self) -> &'static [RegId] {
        self.parents
    }

    /// True when the register can only be named while an EVEX prefix is in
    /// use (XMM16-31 and friends).
    pub fn evex_only(&self) -> bool {
        self.evex_only
    }

    /// Minimum CPU mode (in bits) the register is reachable from. Zero
    /// means any mode.
    pub fn min_mode(&self) -> u16 {
        self.min_mode
    }

    /// Whether the register may be encoded while the CPU is in `mode`.
    pub fn encodable_in(&self, mode: CpuMode) -> bool {
        self.min_mode <= mode.bits()
    }

    /// The form taken when this register is placed in ModR/M.reg,
    /// ModR/M.rm or embedded into an opcode byte.
    pub fn modrm_form(&self) -> RegisterForm {
        self.form_of(self.reg)
    }

    /// The form taken when this register is a memory base or index.
    pub fn base_form(&self) -> RegisterForm {
        self.form_of(self.addr)
    }

    fn form_of(&self, value: u8) -> RegisterForm {
        let needs_rex = value > 7 || matches!(self.name, "spl" | "bpl" | "sil" | "dil");
        RegisterForm {
            evex: value & 0b1_0000 != 0,
            rex: needs_rex,
            rex_field: value & 0b1000 != 0,
            code: value & 0b111,
        }
    }

    /// The inverted 4-bit value placed in VEX.vvvv together with the
    /// inverted V' bit used by EVEX for registers 16-31.
    pub fn vex_vvvv_form(&self) -> (u8, u8) {
        let inverted = !self.reg;
        (inverted & 0b1111, (inverted >> 4) & 1)
    }

    /// The register number shifted into the high nibble of a trailing
    /// /is4 immediate byte.
    pub fn vex_is4_form(&self) -> u8 {
        (self.reg & 0b1111) << 4
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

macro_rules! registers {
    ($(
        $id:ident: $name:literal, $class:ident, $bits:literal,
            reg = $reg:literal, addr = $addr:literal, mode = $mode:literal
            $(, aliases = [$($alias:literal),*])?
            $(, parents = [$($parent:ident),*])?
            $(, evex_only = $evex:literal)?
            ;
    )+) => {
        /// Index of a register in [`REGISTERS`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum RegId {
            $($id),+
        }

        /// Every register index, in table order.
        pub static REG_IDS: &[RegId] = &[$(RegId::$id),+];

        /// The flat register table. Never mutated after startup.
        pub static REGISTERS: &[Register] = &[
            $(Register {
                name: $name,
                aliases: &[$($($alias),*)?],
                class: RegisterClass::$class,
                bits: $bits,
                reg: $reg,
                addr: $addr,
                min_mode: $mode,
                evex_only: false $(|| $evex)?,
                parents: &[$($(RegId::$parent),*)?],
            }),+
        ];
    };
}

registers! {
    // 8-bit general purpose.
    AL:   "al",   GeneralPurpose, 8,  reg = 0,  addr = 0,  mode = 0,  parents = [AX, EAX, RAX];
    CL:   "cl",   GeneralPurpose, 8,  reg = 1,  addr = 1,  mode = 0,  parents = [CX, ECX, RCX];
    DL:   "dl",   GeneralPurpose, 8,  reg = 2,  addr = 2,  mode = 0,  parents = [DX, EDX, RDX];
    BL:   "bl",   GeneralPurpose, 8,  reg = 3,  addr = 3,  mode = 0,  parents = [BX, EBX, RBX];
    AH:   "ah",   GeneralPurpose, 8,  reg = 4,  addr = 4,  mode = 0,  parents = [AX, EAX, RAX];
    CH:   "ch",   GeneralPurpose, 8,  reg = 5,  addr = 5,  mode = 0,  parents = [CX, ECX, RCX];
    DH:   "dh",   GeneralPurpose, 8,  reg = 6,  addr = 6,  mode = 0,  parents = [DX, EDX, RDX];
    BH:   "bh",   GeneralPurpose, 8,  reg = 7,  addr = 7,  mode = 0,  parents = [BX, EBX, RBX];
    SPL:  "spl",  GeneralPurpose, 8,  reg = 4,  addr = 4,  mode = 64, parents = [SP, ESP, RSP];
    BPL:  "bpl",  GeneralPurpose, 8,  reg = 5,  addr = 5,  mode = 64, parents = [BP, EBP, RBP];
    SIL:  "sil",  GeneralPurpose, 8,  reg = 6,  addr = 6,  mode = 64, parents = [SI, ESI, RSI];
    DIL:  "dil",  GeneralPurpose, 8,  reg = 7,  addr = 7,  mode = 64, parents = [DI, EDI, RDI];
    R8B:  "r8b",  GeneralPurpose, 8,  reg = 8,  addr = 8,  mode = 64, aliases = ["r8l"],  parents = [R8W, R8D, R8];
    R9B:  "r9b",  GeneralPurpose, 8,  reg = 9,  addr = 9,  mode = 64, aliases = ["r9l"],  parents = [R9W, R9D, R9];
    R10B: "r10b", GeneralPurpose, 8,  reg = 10, addr = 10, mode = 64, aliases = ["r10l"], parents = [R10W, R10D, R10];
    R11B: "r11b", GeneralPurpose, 8,  reg = 11, addr = 11, mode = 64, aliases = ["r11l"], parents = [R11W, R11D, R11];
    R12B: "r12b", GeneralPurpose, 8,  reg = 12, addr = 12, mode = 64, aliases = ["r12l"], parents = [R12W, R12D, R12];
    R13B: "r13b", GeneralPurpose, 8,  reg = 13, addr = 13, mode = 64, aliases = ["r13l"], parents = [R13W, R13D, R13];
    R14B: "r14b", GeneralPurpose, 8,  reg = 14, addr = 14, mode = 64, aliases = ["r14l"], parents = [R14W, R14D, R14];
    R15B: "r15b", GeneralPurpose, 8,  reg = 15, addr = 15, mode = 64, aliases = ["r15l"], parents = [R15W, R15D, R15];

    // 16-bit general purpose.
    AX:   "ax",   GeneralPurpose, 16, reg = 0,  addr = 0,  mode = 0,  parents = [EAX, RAX];
    CX:   "cx",   GeneralPurpose, 16, reg = 1,  addr = 1,  mode = 0,  parents = [ECX, RCX];
    DX:   "dx",   GeneralPurpose, 16, reg = 2,  addr = 2,  mode = 0,  parents = [EDX, RDX];
    BX:   "bx",   GeneralPurpose, 16, reg = 3,  addr = 3,  mode = 0,  parents = [EBX, RBX];
    SP:   "sp",   GeneralPurpose, 16, reg = 4,  addr = 4,  mode = 0,  parents = [ESP, RSP];
    BP:   "bp",   GeneralPurpose, 16, reg = 5,  addr = 5,  mode = 0,  parents = [EBP, RBP];
    SI:   "si",   GeneralPurpose, 16, reg = 6,  addr = 6,  mode = 0,  parents = [ESI, RSI];
    DI:   "di",   GeneralPurpose, 16, reg = 7,  addr = 7,  mode = 0,  parents = [EDI, RDI];
    R8W:  "r8w",  GeneralPurpose, 16, reg = 8,  addr = 8,  mode = 64, parents = [R8D, R8];
    R9W:  "r9w",  GeneralPurpose, 16, reg = 9,  addr = 9,  mode = 64, parents = [R9D, R9];
    R10W: "r10w", GeneralPurpose, 16, reg = 10, addr = 10, mode = 64, parents = [R10D, R10];
    R11W: "r11w", GeneralPurpose, 16, reg = 11, addr = 11, mode = 64, parents = [R11D, R11];
    R12W: "r12w", GeneralPurpose, 16, reg = 12, addr = 12, mode = 64, parents = [R12D, R12];
    R13W: "r13w", GeneralPurpose, 16, reg = 13, addr = 13, mode = 64, parents = [R13D, R13];
    R14W: "r14w", GeneralPurpose, 16, reg = 14, addr = 14, mode = 64, parents = [R14D, R14];
    R15W: "r15w", GeneralPurpose, 16, reg = 15, addr = 15, mode = 64, parents = [R15D, R15];

    // 32-bit general purpose.
    EAX:  "eax",  GeneralPurpose, 32, reg = 0,  addr = 0,  mode = 0,  parents = [RAX];
    ECX:  "ecx",  GeneralPurpose, 32, reg = 1,  addr = 1,  mode = 0,  parents = [RCX];
    EDX:  "edx",  GeneralPurpose, 32, reg = 2,  addr = 2,  mode = 0,  parents = [RDX];
    EBX:  "ebx",  GeneralPurpose, 32, reg = 3,  addr = 3,  mode = 0,  parents = [RBX];
    ESP:  "esp",  GeneralPurpose, 32, reg = 4,  addr = 4,  mode = 0,  parents = [RSP];
    EBP:  "ebp",  GeneralPurpose, 32, reg = 5,  addr = 5,  mode = 0,  parents = [RBP];
    ESI:  "esi",  GeneralPurpose, 32, reg = 6,  addr = 6,  mode = 0,  parents = [RSI];
    EDI:  "edi",  GeneralPurpose, 32, reg = 7,  addr = 7,  mode = 0,  parents = [RDI];
    R8D:  "r8d",  GeneralPurpose, 32, reg = 8,  addr = 8,  mode = 64, parents = [R8];
    R9D:  "r9d",  GeneralPurpose, 32, reg = 9,  addr = 9,  mode = 64, parents = [R9];
    R10D: "r10d", GeneralPurpose, 32, reg = 10, addr = 10, mode = 64, parents = [R10];
    R11D: "r11d", GeneralPurpose, 32, reg = 11, addr = 11, mode = 64, parents = [R11];
    R12D: "r12d", GeneralPurpose, 32, reg = 12, addr = 12, mode = 64, parents = [R12];
    R13D: "r13d", GeneralPurpose, 32, reg = 13, addr = 13, mode = 64, parents = [R13];
    R14D: "r14d", GeneralPurpose, 32, reg = 14, addr = 14, mode = 64, parents = [R14];
    R15D: "r15d", GeneralPurpose, 32, reg = 15, addr = 15, mode = 64, parents = [R15];

    // 64-bit general purpose.
    RAX:  "rax",  GeneralPurpose, 64, reg = 0,  addr = 0,  mode = 64;
    RCX:  "rcx",  GeneralPurpose, 64, reg = 1,  addr = 1,  mode = 64;
    RDX:  "rdx",  GeneralPurpose, 64, reg = 2,  addr = 2,  mode = 64;
    RBX:  "rbx",  GeneralPurpose, 64, reg = 3,  addr = 3,  mode = 64;
    RSP:  "rsp",  GeneralPurpose, 64, reg = 4,  addr = 4,  mode = 64;
    RBP:  "rbp",  GeneralPurpose, 64, reg = 5,  addr = 5,  mode = 64;
    RSI:  "rsi",  GeneralPurpose, 64, reg = 6,  addr = 6,  mode = 64;
    RDI:  "rdi",  GeneralPurpose, 64, reg = 7,  addr = 7,  mode = 64;
    R8:   "r8",   GeneralPurpose, 64, reg = 8,  addr = 8,  mode = 64;
    R9:   "r9",   GeneralPurpose, 64, reg = 9,  addr = 9,  mode = 64;
    R10:  "r10",  GeneralPurpose, 64, reg = 10, addr = 10, mode = 64;
    R11:  "r11",  GeneralPurpose, 64, reg = 11, addr = 11, mode = 64;
    R12:  "r12",  GeneralPurpose, 64, reg = 12, addr = 12, mode = 64;
    R13:  "r13",  GeneralPurpose, 64, reg = 13, addr = 13, mode = 64;
    R14:  "r14",  GeneralPurpose, 64, reg = 14, addr = 14, mode = 64;
    R15:  "r15",  GeneralPurpose, 64, reg = 15, addr = 15, mode = 64;

    // Segment registers.
    ES: "es", Segment, 16, reg = 0, addr = 0, mode = 0;
    CS: "cs", Segment, 16, reg = 1, addr = 1, mode = 0;
    SS: "ss", Segment, 16, reg = 2, addr = 2, mode = 0;
    DS: "ds", Segment, 16, reg = 3, addr = 3, mode = 0;
    FS: "fs", Segment, 16, reg = 4, addr = 4, mode = 0;
    GS: "gs", Segment, 16, reg = 5, addr = 5, mode = 0;

    // Instruction pointers. The address value 5 is the ModR/M.rm code of
    // RIP-relative addressing (mod=00, r/m=101).
    IP:  "ip",  InstructionPointer, 16, reg = 0, addr = 5, mode = 0,  parents = [EIP, RIP];
    EIP: "eip", InstructionPointer, 32, reg = 0, addr = 5, mode = 32, parents = [RIP];
    RIP: "rip", InstructionPointer, 64, reg = 0, addr = 5, mode = 64;

    // x87 stack.
    ST:  "st",  Float,    80, reg = 0, addr = 0, mode = 0;
    ST0: "st0", X87Stack, 80, reg = 0, addr = 0, mode = 0, aliases = ["st(0)"];
    ST1: "st1", X87Stack, 80, reg = 1, addr = 1, mode = 0, aliases = ["st(1)"];
    ST2: "st2", X87Stack, 80, reg = 2, addr = 2, mode = 0, aliases = ["st(2)"];
    ST3: "st3", X87Stack, 80, reg = 3, addr = 3, mode = 0, aliases = ["st(3)"];
    ST4: "st4", X87Stack, 80, reg = 4, addr = 4, mode = 0, aliases = ["st(4)"];
    ST5: "st5", X87Stack, 80, reg = 5, addr = 5, mode = 0, aliases = ["st(5)"];
    ST6: "st6", X87Stack, 80, reg = 6, addr = 6, mode = 0, aliases = ["st(6)"];
    ST7: "st7", X87Stack, 80, reg = 7, addr = 7, mode = 0, aliases = ["st(7)"];

    // Control registers. CR8 and up are only reachable in 64-bit mode.
    CR0:  "cr0",  Control, 64, reg = 0,  addr = 0,  mode = 0;
    CR1:  "cr1",  Control, 64, reg = 1,  addr = 1,  mode = 0;
    CR2:  "cr2",  Control, 64, reg = 2,  addr = 2,  mode = 0;
    CR3:  "cr3",  Control, 64, reg = 3,  addr = 3,  mode = 0;
    CR4:  "cr4",  Control, 64, reg = 4,  addr = 4,  mode = 0;
    CR5:  "cr5",  Control, 64, reg = 5,  addr = 5,  mode = 0;
    CR6:  "cr6",  Control, 64, reg = 6,  addr = 6,  mode = 0;
    CR7:  "cr7",  Control, 64, reg = 7,  addr = 7,  mode = 0;
    CR8:  "cr8",  Control, 64, reg = 8,  addr = 8,  mode = 64;
    CR9:  "cr9",  Control, 64, reg = 9,  addr = 9,  mode = 64;
    CR10: "cr10", Control, 64, reg = 10, addr = 10, mode = 64;
    CR11: "cr11", Control, 64, reg = 11, addr = 11, mode = 64;
    CR12: "cr12", Control, 64, reg = 12, addr = 12, mode = 64;
    CR13: "cr13", Control, 64, reg = 13, addr = 13, mode = 64;
    CR14: "cr14", Control, 64, reg = 14, addr = 14, mode = 64;
    CR15: "cr15", Control, 64, reg = 15, addr = 15, mode = 64;

    // Debug registers.
    DR0:  "dr0",  Debug, 64, reg = 0,  addr = 0,  mode = 0;
    DR1:  "dr1",  Debug, 64, reg = 1,  addr = 1,  mode = 0;
    DR2:  "dr2",  Debug, 64, reg = 2,  addr = 2,  mode = 0;
    DR3:  "dr3",  Debug, 64, reg = 3,  addr = 3,  mode = 0;
    DR4:  "dr4",  Debug, 64, reg = 4,  addr = 4,  mode = 0;
    DR5:  "dr5",  Debug, 64, reg = 5,  addr = 5,  mode = 0;
    DR6:  "dr6",  Debug, 64, reg = 6,  addr = 6,  mode = 0;
    DR7:  "dr7",  Debug, 64, reg = 7,  addr = 7,  mode = 0;
    DR8:  "dr8",  Debug, 64, reg = 8,  addr = 8,  mode = 64;
    DR9:  "dr9",  Debug, 64, reg = 9,  addr = 9,  mode = 64;
    DR10: "dr10", Debug, 64, reg = 10, addr = 10, mode = 64;
    DR11: "dr11", Debug, 64, reg = 11, addr = 11, mode = 64;
    DR12: "dr12", Debug, 64, reg = 12, addr = 12, mode = 64;
    DR13: "dr13", Debug, 64, reg = 13, addr = 13, mode = 64;
    DR14: "dr14", Debug, 64, reg = 14, addr = 14, mode = 64;
    DR15: "dr15", Debug, 64, reg = 15, addr = 15, mode = 64;

    // AVX-512 opmask registers.
    K0: "k0", Opmask, 64, reg = 0, addr = 0, mode = 0;
    K1: "k1", Opmask, 64, reg = 1, addr = 1, mode = 0;
    K2: "k2", Opmask, 64, reg = 2, addr = 2, mode = 0;
    K3: "k3", Opmask, 64, reg = 3, addr = 3, mode = 0;
    K4: "k4", Opmask, 64, reg = 4, addr = 4, mode = 0;
    K5: "k5", Opmask, 64, reg = 5, addr = 5, mode = 0;
    K6: "k6", Opmask, 64, reg = 6, addr = 6, mode = 0;
    K7: "k7", Opmask, 64, reg = 7, addr = 7, mode = 0;

    // MPX bounds registers.
    BND0: "bnd0", Bounds, 128, reg = 0, addr = 0, mode = 0;
    BND1: "bnd1", Bounds, 128, reg = 1, addr = 1, mode = 0;
    BND2: "bnd2", Bounds, 128, reg = 2, addr = 2, mode = 0;
    BND3: "bnd3", Bounds, 128, reg = 3, addr = 3, mode = 0;

    // MMX registers alias the low halves of the x87 stack slots.
    MM0: "mm0", Mmx, 64, reg = 0, addr = 0, mode = 0, parents = [ST0];
    MM1: "mm1", Mmx, 64, reg = 1, addr = 1, mode = 0, parents = [ST1];
    MM2: "mm2", Mmx, 64, reg = 2, addr = 2, mode = 0, parents = [ST2];
    MM3: "mm3", Mmx, 64, reg = 3, addr = 3, mode = 0, parents = [ST3];
    MM4: "mm4", Mmx, 64, reg = 4, addr = 4, mode = 0, parents = [ST4];
    MM5: "mm5", Mmx, 64, reg = 5, addr = 5, mode = 0, parents = [ST5];
    MM6: "mm6", Mmx, 64, reg = 6, addr = 6, mode = 0, parents = [ST6];
    MM7: "mm7", Mmx, 64, reg = 7, addr = 7, mode = 0, parents = [ST7];

    // AMX tile registers.
    TMM0: "tmm0", Tmm, 8192, reg = 0, addr = 0, mode = 64;
    TMM1: "tmm1", Tmm, 8192, reg = 1, addr = 1, mode = 64;
    TMM2: "tmm2", Tmm, 8192, reg = 2, addr = 2, mode = 64;
    TMM3: "tmm3", Tmm, 8192, reg = 3, addr = 3, mode = 64;
    TMM4: "tmm4", Tmm, 8192, reg = 4, addr = 4, mode = 64;
    TMM5: "tmm5", Tmm, 8192, reg = 5, addr = 5, mode = 64;
    TMM6: "tmm6", Tmm, 8192, reg = 6, addr = 6, mode = 64;
    TMM7: "tmm7", Tmm, 8192, reg = 7, addr = 7, mode = 64;

    // XMM registers. 16-31 need EVEX and 64-bit mode.
    XMM0:  "xmm0",  Xmm, 128, reg = 0,  addr = 0,  mode = 0,  parents = [YMM0, ZMM0];
    XMM1:  "xmm1",  Xmm, 128, reg = 1,  addr = 1,  mode = 0,  parents = [YMM1, ZMM1];
    XMM2:  "xmm2",  Xmm, 128, reg = 2,  addr = 2,  mode = 0,  parents = [YMM2, ZMM2];
    XMM3:  "xmm3",  Xmm, 128, reg = 3,  addr = 3,  mode = 0,  parents = [YMM3, ZMM3];
    XMM4:  "xmm4",  Xmm, 128, reg = 4,  addr = 4,  mode = 0,  parents = [YMM4, ZMM4];
    XMM5:  "xmm5",  Xmm, 128, reg = 5,  addr = 5,  mode = 0,  parents = [YMM5, ZMM5];
    XMM6:  "xmm6",  Xmm, 128, reg = 6,  addr = 6,  mode = 0,  parents = [YMM6, ZMM6];
    XMM7:  "xmm7",  Xmm, 128, reg = 7,  addr = 7,  mode = 0,  parents = [YMM7, ZMM7];
    XMM8:  "xmm8",  Xmm, 128, reg = 8,  addr = 8,  mode = 64, parents = [YMM8, ZMM8];
    XMM9:  "xmm9",  Xmm, 128, reg = 9,  addr = 9,  mode = 64, parents = [YMM9, ZMM9];
    XMM10: "xmm10", Xmm, 128, reg = 10, addr = 10, mode = 64, parents = [YMM10, ZMM10];
    XMM11: "xmm11", Xmm, 128, reg = 11, addr = 11, mode = 64, parents = [YMM11, ZMM11];
    XMM12: "xmm12", Xmm, 128, reg = 12, addr = 12, mode = 64, parents = [YMM12, ZMM12];
    XMM13: "xmm13", Xmm, 128, reg = 13, addr = 13, mode = 64, parents = [YMM13, ZMM13];
    XMM14: "xmm14", Xmm, 128, reg = 14, addr = 14, mode = 64, parents = [YMM14, ZMM14];
    XMM15: "xmm15", Xmm, 128, reg = 15, addr = 15, mode = 64, parents = [YMM15, ZMM15];
    XMM16: "xmm16", Xmm, 128, reg = 16, addr = 16, mode = 64, parents = [YMM16, ZMM16], evex_only = true;
    XMM17: "xmm17", Xmm, 128, reg = 17, addr = 17, mode = 64, parents = [YMM17, ZMM17], evex_only = true;
    XMM18: "xmm18", Xmm, 128, reg = 18, addr = 18, mode = 64, parents = [YMM18, ZMM18], evex_only = true;
    XMM19: "xmm19", Xmm, 128, reg = 19, addr = 19, mode = 64, parents = [YMM19, ZMM19], evex_only = true;
    XMM20: "xmm20", Xmm, 128, reg = 20, addr = 20, mode = 64, parents = [YMM20, ZMM20], evex_only = true;
    XMM21: "xmm21", Xmm, 128, reg = 21, addr = 21, mode = 64, parents = [YMM21, ZMM21], evex_only = true;
    XMM22: "xmm22", Xmm, 128, reg = 22, addr = 22, mode = 64, parents = [YMM22, ZMM22], evex_only = true;
    XMM23: "xmm23", Xmm, 128, reg = 23, addr = 23, mode = 64, parents = [YMM23, ZMM23], evex_only = true;
    XMM24: "xmm24", Xmm, 128, reg = 24, addr = 24, mode = 64, parents = [YMM24, ZMM24], evex_only = true;
    XMM25: "xmm25", Xmm, 128, reg = 25, addr = 25, mode = 64, parents = [YMM25, ZMM25], evex_only = true;
    XMM26: "xmm26", Xmm, 128, reg = 26, addr = 26, mode = 64, parents = [YMM26, ZMM26], evex_only = true;
    XMM27: "xmm27", Xmm, 128, reg = 27, addr = 27, mode = 64, parents = [YMM27, ZMM27], evex_only = true;
    XMM28: "xmm28", Xmm, 128, reg = 28, addr = 28, mode = 64, parents = [YMM28, ZMM28], evex_only = true;
    XMM29: "xmm29", Xmm, 128, reg = 29, addr = 29, mode = 64, parents = [YMM29, ZMM29], evex_only = true;
    XMM30: "xmm30", Xmm, 128, reg = 30, addr = 30, mode = 64, parents = [YMM30, ZMM30], evex_only = true;
    XMM31: "xmm31", Xmm, 128, reg = 31, addr = 31, mode = 64, parents = [YMM31, ZMM31], evex_only = true;

    // YMM registers.
    YMM0:  "ymm0",  Ymm, 256, reg = 0,  addr = 0,  mode = 0,  parents = [ZMM0];
    YMM1:  "ymm1",  Ymm, 256, reg = 1,  addr = 1,  mode = 0,  parents = [ZMM1];
    YMM2:  "ymm2",  Ymm, 256, reg = 2,  addr = 2,  mode = 0,  parents = [ZMM2];
    YMM3:  "ymm3",  Ymm, 256, reg = 3,  addr = 3,  mode = 0,  parents = [ZMM3];
    YMM4:  "ymm4",  Ymm, 256, reg = 4,  addr = 4,  mode = 0,  parents = [ZMM4];
    YMM5:  "ymm5",  Ymm, 256, reg = 5,  addr = 5,  mode = 0,  parents = [ZMM5];
    YMM6:  "ymm6",  Ymm, 256, reg = 6,  addr = 6,  mode = 0,  parents = [ZMM6];
    YMM7:  "ymm7",  Ymm, 256, reg = 7,  addr = 7,  mode = 0,  parents = [ZMM7];
    YMM8:  "ymm8",  Ymm, 256, reg = 8,  addr = 8,  mode = 64, parents = [ZMM8];
    YMM9:  "ymm9",  Ymm, 256, reg = 9,  addr = 9,  mode = 64, parents = [ZMM9];
    YMM10: "ymm10", Ymm, 256, reg = 10, addr = 10, mode = 64, parents = [ZMM10];
    YMM11: "ymm11", Ymm, 256, reg = 11, addr = 11, mode = 64, parents = [ZMM11];
    YMM12: "ymm12", Ymm, 256, reg = 12, addr = 12, mode = 64, parents = [ZMM12];
    YMM13: "ymm13", Ymm, 256, reg = 13, addr = 13, mode = 64, parents = [ZMM13];
    YMM14: "ymm14", Ymm, 256, reg = 14, addr = 14, mode = 64, parents = [ZMM14];
    YMM15: "ymm15", Ymm, 256, reg = 15, addr = 15, mode = 64, parents = [ZMM15];
    YMM16: "ymm16", Ymm, 256, reg = 16, addr = 16, mode = 64, parents = [ZMM16], evex_only = true;
    YMM17: "ymm17", Ymm, 256, reg = 17, addr = 17, mode = 64, parents = [ZMM17], evex_only = true;
    YMM18: "ymm18", Ymm, 256, reg = 18, addr = 18, mode = 64, parents = [ZMM18], evex_only = true;
    YMM19: "ymm19", Ymm, 256, reg = 19, addr = 19, mode = 64, parents = [ZMM19], evex_only = true;
    YMM20: "ymm20", Ymm, 256, reg = 20, addr = 20, mode = 64, parents = [ZMM20], evex_only = true;
    YMM21: "ymm21", Ymm, 256, reg = 21, addr = 21, mode = 64, parents = [ZMM21], evex_only = true;
    YMM22: "ymm22", Ymm, 256, reg = 22, addr = 22, mode = 64, parents = [ZMM22], evex_only = true;
    YMM23: "ymm23", Ymm, 256, reg = 23, addr = 23, mode = 64, parents = [ZMM23], evex_only = true;
    YMM24: "ymm24", Ymm, 256, reg = 24, addr = 24, mode = 64, parents = [ZMM24], evex_only = true;
    YMM25: "ymm25", Ymm, 256, reg = 25, addr = 25, mode = 64, parents = [ZMM25], evex_only = true;
    YMM26: "ymm26", Ymm, 256, reg = 26, addr = 26, mode = 64, parents = [ZMM26], evex_only = true;
    YMM27: "ymm27", Ymm, 256, reg = 27, addr = 27, mode = 64, parents = [ZMM27], evex_only = true;
    YMM28: "ymm28", Ymm, 256, reg = 28, addr = 28, mode = 64, parents = [ZMM28], evex_only = true;
    YMM29: "ymm29", Ymm, 256, reg = 29, addr = 29, mode = 64, parents = [ZMM29], evex_only = true;
    YMM30: "ymm30", Ymm, 256, reg = 30, addr = 30, mode = 64, parents = [ZMM30], evex_only = true;
    YMM31: "ymm31", Ymm, 256, reg = 31, addr = 31, mode = 64, parents = [ZMM31], evex_only = true;

    // ZMM registers.
    ZMM0:  "zmm0",  Zmm, 512, reg = 0,  addr = 0,  mode = 0;
    ZMM1:  "zmm1",  Zmm, 512, reg = 1,  addr = 1,  mode = 0;
    ZMM2:  "zmm2",  Zmm, 512, reg = 2,  addr = 2,  mode = 0;
    ZMM3:  "zmm3",  Zmm, 512, reg = 3,  addr = 3,  mode = 0;
    ZMM4:  "zmm4",  Zmm, 512, reg = 4,  addr = 4,  mode = 0;
    ZMM5:  "zmm5",  Zmm, 512, reg = 5,  addr = 5,  mode = 0;
    ZMM6:  "zmm6",  Zmm, 512, reg = 6,  addr = 6,  mode = 0;
    ZMM7:  "zmm7",  Zmm, 512, reg = 7,  addr = 7,  mode = 0;
    ZMM8:  "zmm8",  Zmm, 512, reg = 8,  addr = 8,  mode = 64;
    ZMM9:  "zmm9",  Zmm, 512, reg = 9,  addr = 9,  mode = 64;
    ZMM10: "zmm10", Zmm, 512, reg = 10, addr = 10, mode = 64;
    ZMM11: "zmm11", Zmm, 512, reg = 11, addr = 11, mode = 64;
    ZMM12: "zmm12", Zmm, 512, reg = 12, addr = 12, mode = 64;
    ZMM13: "zmm13", Zmm, 512, reg = 13, addr = 13, mode = 64;
    ZMM14: "zmm14", Zmm, 512, reg = 14, addr = 14, mode = 64;
    ZMM15: "zmm15", Zmm, 512, reg = 15, addr = 15, mode = 64;
    ZMM16: "zmm16", Zmm, 512, reg = 16, addr = 16, mode = 64, evex_only = true;
    ZMM17: "zmm17", Zmm, 512, reg = 17, addr = 17, mode = 64, evex_only = true;
    ZMM18: "zmm18", Zmm, 512, reg = 18, addr = 18, mode = 64, evex_only = true;
    ZMM19: "zmm19", Zmm, 512, reg = 19, addr = 19, mode = 64, evex_only = true;
    ZMM20: "zmm20", Zmm, 512, reg = 20, addr = 20, mode = 64, evex_only = true;
    ZMM21: "zmm21", Zmm, 512, reg = 21, addr = 21, mode = 64, evex_only = true;
    ZMM22: "zmm22", Zmm, 512, reg = 22, addr = 22, mode = 64, evex_only = true;
    ZMM23: "zmm23", Zmm, 512, reg = 23, addr = 23, mode = 64, evex_only = true;
    ZMM24: "zmm24", Zmm, 512, reg = 24, addr = 24, mode = 64, evex_only = true;
    ZMM25: "zmm25", Zmm, 512, reg = 25, addr = 25, mode = 64, evex_only = true;
    ZMM26: "zmm26", Zmm, 512, reg = 26, addr = 26, mode = 64, evex_only = true;
    ZMM27: "zmm27", Zmm, 512, reg = 27, addr = 27, mode = 64, evex_only = true;
    ZMM28: "zmm28", Zmm, 512, reg = 28, addr = 28, mode = 64, evex_only = true;
    ZMM29: "zmm29", Zmm, 512, reg = 29, addr = 29, mode = 64, evex_only = true;
    ZMM30: "zmm30", Zmm, 512, reg = 30, addr = 30, mode = 64, evex_only = true;
    ZMM31: "zmm31", Zmm, 512, reg = 31, addr = 31, mode = 64, evex_only = true;

    // Register pairs named by implicit operands (CMPXCHG8B and friends).
    DXAX:   "dx:ax",   RegisterPair, 32,  reg = 0, addr = 0, mode = 0;
    EDXEAX: "edx:eax", RegisterPair, 64,  reg = 0, addr = 0, mode = 0;
    RDXRAX: "rdx:rax", RegisterPair, 128, reg = 0, addr = 0, mode = 64;
    ECXEBX: "ecx:ebx", RegisterPair, 64,  reg = 0, addr = 0, mode = 0;
    RCXRBX: "rcx:rbx", RegisterPair, 128, reg = 0, addr = 0, mode = 64;
}

impl RegId {
    /// The register this index refers to.
    pub fn register(self) -> &'static Register {
        &REGISTERS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.register().name
    }
}

impl Serialize for RegId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

static BY_NAME: Lazy<HashMap<&'static str, RegId>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (&id, register) in REG_IDS.iter().zip(REGISTERS.iter()) {
        map.insert(register.name, id);
        for &alias in register.aliases {
            map.insert(alias, id);
        }
    }
    map
});

/// Look a register up by its lower-case name or one of its aliases.
/// Mixed-case input is accepted.
pub fn lookup_by_name(name: &str) -> Option<&'static Register> {
    lookup_id(name).map(RegId::register)
}

/// Like [`lookup_by_name`] but returns the table index.
pub fn lookup_id(name: &str) -> Option<RegId> {
    if let Some(&id) = BY_NAME.get(name) {
        return Some(id);
    }
    let lowered = name.to_ascii_lowercase();
    BY_NAME.get(lowered.as_str()).copied()
}

macro_rules! group {
    ($name:ident = [$($id:ident),* $(,)?]) => {
        pub static $name: &[RegId] = &[$(RegId::$id),*];
    };
}

group!(REGISTERS_8BIT_GENERAL_PURPOSE = [
    AL, CL, DL, BL, AH, CH, DH, BH, SPL, BPL, SIL, DIL,
    R8B, R9B, R10B, R11B, R12B, R13B, R14B, R15B,
]);
group!(REGISTERS_16BIT_GENERAL_PURPOSE = [
    AX, CX, DX, BX, SP, BP, SI, DI,
    R8W, R9W, R10W, R11W, R12W, R13W, R14W, R15W,
]);
group!(REGISTERS_32BIT_GENERAL_PURPOSE = [
    EAX, ECX, EDX, EBX, ESP, EBP, ESI, EDI,
    R8D, R9D, R10D, R11D, R12D, R13D, R14D, R15D,
]);
group!(REGISTERS_64BIT_GENERAL_PURPOSE = [
    RAX, RCX, RDX, RBX, RSP, RBP, RSI, RDI,
    R8, R9, R10, R11, R12, R13, R14, R15,
]);
// Registers that can be the base of a memory operand.
group!(REGISTERS_ADDRESS = [
    EAX, ECX, EDX, EBX, ESP, EBP, ESI, EDI,
    R8D, R9D, R10D, R11D, R12D, R13D, R14D, R15D,
    RAX, RCX, RDX, RBX, RSP, RBP, RSI, RDI,
    R8, R9, R10, R11, R12, R13, R14, R15,
    EIP, RIP,
]);
// Registers that can be the index of a memory operand. The stack pointer
// has no index encoding (its SIB.index value selects "none").
group!(REGISTERS_INDEX = [
    EAX, ECX, EDX, EBX, EBP, ESI, EDI,
    R8D, R9D, R10D, R11D, R12D, R13D, R14D, R15D,
    RAX, RCX, RDX, RBX, RBP, RSI, RDI,
    R8, R9, R10, R11, R12, R13, R14, R15,
]);
group!(REGISTERS_16BIT_SEGMENT = [ES, CS, SS, DS, FS, GS]);
group!(REGISTERS_STACK_INDICES = [ST0, ST1, ST2, ST3, ST4, ST5, ST6, ST7]);
group!(REGISTERS_CONTROL = [
    CR0, CR1, CR2, CR3, CR4, CR5, CR6, CR7,
    CR8, CR9, CR10, CR11, CR12, CR13, CR14, CR15,
]);
group!(REGISTERS_DEBUG = [
    DR0, DR1, DR2, DR3, DR4, DR5, DR6, DR7,
    DR8, DR9, DR10, DR11, DR12, DR13, DR14, DR15,
]);
group!(REGISTERS_OPMASK = [K0, K1, K2, K3, K4, K5, K6, K7]);
group!(REGISTERS_BOUNDS = [BND0, BND1, BND2, BND3]);
group!(REGISTERS_64BIT_MMX = [MM0, MM1, MM2, MM3, MM4, MM5, MM6, MM7]);
group!(REGISTERS_TMM = [TMM0, TMM1, TMM2, TMM3, TMM4, TMM5, TMM6, TMM7]);
group!(REGISTERS_128BIT_XMM = [
    XMM0, XMM1, XMM2, XMM3, XMM4, XMM5, XMM6, XMM7,
    XMM8, XMM9, XMM10, XMM11, XMM12, XMM13, XMM14, XMM15,
    XMM16, XMM17, XMM18, XMM19, XMM20, XMM21, XMM22, XMM23,
    XMM24, XMM25, XMM26, XMM27, XMM28, XMM29, XMM30, XMM31,
]);
group!(REGISTERS_256BIT_YMM = [
    YMM0, YMM1, YMM2, YMM3, YMM4, YMM5, YMM6, YMM7,
    YMM8, YMM9, YMM10, YMM11, YMM12, YMM13, YMM14, YMM15,
    YMM16, YMM17, YMM18, YMM19, YMM20, YMM21, YMM22, YMM23,
    YMM24, YMM25, YMM26, YMM27, YMM28, YMM29, YMM30, YMM31,
]);
group!(REGISTERS_512BIT_ZMM = [
    ZMM0, ZMM1, ZMM2, ZMM3, ZMM4, ZMM5, ZMM6, ZMM7,
    ZMM8, ZMM9, ZMM10, ZMM11, ZMM12, ZMM13, ZMM14, ZMM15,
    ZMM16, ZMM17, ZMM18, ZMM19, ZMM20, ZMM21, ZMM22, ZMM23,
    ZMM24, ZMM25, ZMM26, ZMM27, ZMM28, ZMM29, ZMM30, ZMM31,
]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_names_and_aliases() {
        assert_eq!(lookup_id("rax"), Some(RegId::RAX));
        assert_eq!(lookup_id("RAX"), Some(RegId::RAX));
        assert_eq!(lookup_id("st(3)"), Some(RegId::ST3));
        assert_eq!(lookup_id("r8l"), Some(RegId::R8B));
        assert_eq!(lookup_id("zmm99"), None);
    }

    #[test]
    fn modrm_forms() {
        let r8 = RegId::R8.register().modrm_form();
        assert!(r8.rex && r8.rex_field && !r8.evex);
        assert_eq!(r8.code, 0);

        let spl = RegId::SPL.register().modrm_form();
        assert!(spl.rex && !spl.rex_field);
        assert_eq!(spl.code, 4);

        let bh = RegId::BH.register().modrm_form();
        assert!(!bh.rex);
        assert_eq!(bh.code, 7);

        let xmm20 = RegId::XMM20.register().modrm_form();
        assert!(xmm20.evex && xmm20.rex && !xmm20.rex_field);
        assert_eq!(xmm20.code, 4);
    }

    #[test]
    fn vvvv_is_inverted() {
        assert_eq!(RegId::XMM0.register().vex_vvvv_form(), (0b1111, 1));
        assert_eq!(RegId::XMM15.register().vex_vvvv_form(), (0b0000, 1));
        assert_eq!(RegId::XMM17.register().vex_vvvv_form(), (0b1110, 0));
    }

    #[test]
    fn is4_sits_in_the_high_nibble() {
        assert_eq!(RegId::XMM3.register().vex_is4_form(), 0x30);
        assert_eq!(RegId::YMM12.register().vex_is4_form(), 0xC0);
    }

    #[test]
    fn mode_gating() {
        use crate::CpuMode;
        assert!(RegId::EAX.register().encodable_in(CpuMode::Protected32));
        assert!(!RegId::RAX.register().encodable_in(CpuMode::Protected32));
        assert!(!RegId::CR8.register().encodable_in(CpuMode::Protected32));
        assert!(RegId::CR8.register().encodable_in(CpuMode::Long64));
    }

    #[test]
    fn parent_graph() {
        let al = RegId::AL.register();
        assert_eq!(al.parents(), &[RegId::AX, RegId::EAX, RegId::RAX]);
        assert!(RegId::RAX.register().parents().is_empty());
    }
}
