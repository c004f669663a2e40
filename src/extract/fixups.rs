//! Normalisation and correction tables.
//!
//! The manual is typeset by humans and carries a long tail of
//! inconsistencies. Every rewrite lives in one of the fixed tables below
//! so that each correction is enumerable and countable. All of the
//! rewriting functions are idempotent.

/// Dash-normalisation: every en/em dash, with or without surrounding
/// spaces, collapses to a plain `-`.
const DASHES: &[(&str, &str)] = &[
    (" \u{2014} ", "-"),
    (" \u{2013} ", "-"),
    ("\u{2014} ", "-"),
    ("\u{2013} ", "-"),
    (" \u{2014}", "-"),
    (" \u{2013}", "-"),
    ("\u{2014}", "-"),
    ("\u{2013}", "-"),
];

pub fn normalize_dashes(s: &str) -> String {
    let mut out = s.to_string();
    for &(from, to) in DASHES {
        out = out.replace(from, to);
    }
    out
}

/// Headlines that need rewriting verbatim after dash normalisation.
const HEADLINE_REWRITES: &[(&str, &str)] = &[
    ("PTEST- Logical Compare", "PTEST-Logical Compare"),
    (
        "MOVSD-Move or Merge Scalar Double-Precision Floating-Point Value",
        "MOVSD-Move or Merge Scalar Double Precision Floating-Point Value",
    ),
    (
        "VPCMPB/VPCMPUB-Compare Packed Byte Values Into Mask",
        "VPCMPB/VPCMPUB-Compare Packed Byte Values into Mask",
    ),
];

pub fn normalize_headline(s: &str) -> String {
    let mut out = normalize_dashes(s.trim());
    for &(from, to) in HEADLINE_REWRITES {
        if out == from {
            out = to.to_string();
        }
    }
    out
}

/// Opcode-column spacing and case repairs. Applied in order; the output
/// feeds the strict encoding grammar.
const OPCODE_FIXES: &[(&str, &str)] = &[
    ("0f ", "0F "),
    ("REX.w", "REX.W"),
    ("REX.W +", "REX.W"),
    ("REX.R +", "REX.R"),
    ("REX +", "REX"),
    ("0F 38.", "0F38."),
    ("0F 3A.", "0F3A."),
    ("+ rb", "+rb"),
    ("+ rw", "+rw"),
    ("+ rd", "+rd"),
    ("+ ro", "+ro"),
    ("+ r", "+r"),
    ("+ i", "+i"),
    ("/ r", "/r"),
    ("/is 4", "/is4"),
    ("EVEX.128 ", "EVEX.128."),
    ("VEX.128 ", "VEX.128."),
];

/// Repairs an opcode cell. Returns the fixed text and whether anything
/// changed (the caller counts it as an instruction error).
pub fn fix_opcode(s: &str) -> (String, bool) {
    let mut out = s.trim().to_string();
    for &(from, to) in OPCODE_FIXES {
        out = out.replace(from, to);
    }
    while out.contains("  ") {
        out = out.replace("  ", " ");
    }
    let changed = out != s.trim();
    (out, changed)
}

/// Instruction-column repairs: canonical operand spellings and removal of
/// spurious footnote markers.
const INSTRUCTION_FIXES: &[(&str, &str)] = &[
    // An unqualified `reg` leaves the register width to the reader; the
    // surviving uses all mean a 32-bit register except the r16 forms of
    // LAR/LSL, which the manual spells explicitly.
    ("reg/m16", "r32/m16"),
    ("reg/m8", "r32/m8"),
    ("reg, ", "r32, "),
    ("sibmem", "mib"),
    // Fixed registers are upper-case everywhere else.
    (", cl", ", CL"),
    (", al", ", AL"),
    (", ax", ", AX"),
    (", eax", ", EAX"),
    (", rax", ", RAX"),
    (", dx", ", DX"),
    // Footnote markers that leak into operand names.
    ("xmm2+3", "xmm2"),
    ("xmm1+3", "xmm1"),
    ("imm8+1", "imm8"),
    ("ymm2.m256", "ymm2/m256"),
    ("*", ""),
];

pub fn fix_instruction(s: &str) -> (String, bool) {
    let mut out = s.trim().to_string();
    for &(from, to) in INSTRUCTION_FIXES {
        out = out.replace(from, to);
    }
    out = out.trim().to_string();
    let changed = out != s.trim();
    (out, changed)
}

/// CPUID-column spelling repairs, exact-match.
const CPUID_FIXES: &[(&str, &str)] = &[
    ("AESKLEWIDE_KL", "AESKLE WIDE_KL"),
    ("Both AES and AVX flags", "AES AVX"),
    ("Both AES andAVX flags", "AES AVX"),
    ("HLE or RTM", "HLE RTM"),
    ("HLE1", "HLE"),
    ("AVX5121", "AVX512"),
    ("PCLMULQDQ1", "PCLMULQDQ"),
];

pub fn fix_cpuid(s: &str) -> (String, bool) {
    let trimmed = s.trim();
    for &(from, to) in CPUID_FIXES {
        if trimmed == from {
            return (to.to_string(), true);
        }
    }
    (trimmed.to_string(), false)
}

/// Canonicalises one mode-support cell. `None` means the cell is not a
/// recognisable validity marker.
pub fn mode_validity(s: &str) -> Option<bool> {
    match s.trim() {
        "V" | "V*" | "V1" | "Valid" | "Valid*" | "Valid1" => Some(true),
        "I" | "Inv." | "Invalid" | "N.E." | "N.P." | "N.I." | "N.S." | "NE" | "NP" | "NS" => {
            Some(false)
        }
        _ => None,
    }
}

/// Operand-encoding identifier repairs (the Op/En cells).
const OPENC_FIXES: &[(&str, &str)] = &[
    // The MOVDQ listings misprint their own name in the Op/En column.
    ("MOVDM", "MOVDQ"),
    // VMASKMOV's identifier wraps across two lines.
    ("RV M", "RVM"),
    ("MV R", "MVR"),
];

pub fn fix_openc(s: &str) -> (String, bool) {
    let trimmed = s.trim();
    for &(from, to) in OPENC_FIXES {
        if trimmed == from {
            return (to.to_string(), true);
        }
    }
    (trimmed.to_string(), false)
}

/// A genuine error in the manual: the opcode or instruction column of a
/// specific row is wrong and must be replaced before parsing.
pub struct ManualError {
    /// The instruction column as extracted, used as the row key.
    pub instruction: &'static str,
    /// The opcode column as extracted; empty matches any opcode.
    pub opcode: &'static str,
    pub fixed_opcode: Option<&'static str>,
    pub fixed_instruction: Option<&'static str>,
}

/// Rows the manual itself gets wrong. Each applied repair counts against
/// the error counter.
pub const MANUAL_ERRORS: &[ManualError] = &[
    // A stray duplicate byte in the opcode column.
    ManualError {
        instruction: "XBEGIN rel16",
        opcode: "C7 F8 C7 F8",
        fixed_opcode: Some("C7 F8"),
        fixed_instruction: None,
    },
    // Missing /r on the register form.
    ManualError {
        instruction: "MOVLPS xmm1, m64",
        opcode: "NP 0F 12",
        fixed_opcode: Some("NP 0F 12 /r"),
        fixed_instruction: None,
    },
    // Missing immediate token.
    ManualError {
        instruction: "KSHIFTRW k1, k2, imm8",
        opcode: "VEX.L1.66.0F3A.W1 30 /r",
        fixed_opcode: Some("VEX.L1.66.0F3A.W1 30 /r ib"),
        fixed_instruction: None,
    },
    // In 64-bit mode MOV to CR8 is encoded with REX.R over CR0's code;
    // the manual writes the ambiguous register form.
    ManualError {
        instruction: "MOV CR8, r64",
        opcode: "0F 22 /0",
        fixed_opcode: Some("REX.R 0F 22 /0"),
        fixed_instruction: None,
    },
    ManualError {
        instruction: "MOV r64, CR8",
        opcode: "0F 20 /0",
        fixed_opcode: Some("REX.R 0F 20 /0"),
        fixed_instruction: None,
    },
];

/// Looks a row up in the manual-error table.
pub fn manual_error(instruction: &str, opcode: &str) -> Option<&'static ManualError> {
    MANUAL_ERRORS.iter().find(|e| {
        e.instruction == instruction && (e.opcode.is_empty() || e.opcode == opcode)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_normalisation() {
        assert_eq!(normalize_dashes("MOV\u{2014}Move"), "MOV-Move");
        assert_eq!(normalize_dashes("MOV \u{2013} Move"), "MOV-Move");
        assert_eq!(normalize_dashes("MOV \u{2014}Move"), "MOV-Move");
    }

    #[test]
    fn normalisations_are_idempotent() {
        let inputs = [
            "MOV \u{2014} Move",
            "REX.w + 8B /r",
            "VCMPPS xmm1, xmm2, xmm3/m128*",
            "Both AES and AVX flags",
        ];
        for input in inputs {
            let once = normalize_dashes(input);
            assert_eq!(normalize_dashes(&once), once);

            let (once, _) = fix_opcode(input);
            assert_eq!(fix_opcode(&once).0, once);

            let (once, _) = fix_instruction(input);
            assert_eq!(fix_instruction(&once).0, once);

            let (once, _) = fix_cpuid(input);
            assert_eq!(fix_cpuid(&once).0, once);
        }
    }

    #[test]
    fn opcode_spacing() {
        assert_eq!(fix_opcode("REX.w + 8B /r"), ("REX.W 8B /r".to_string(), true));
        assert_eq!(fix_opcode("B8+ rd id").0, "B8+rd id");
        assert_eq!(
            fix_opcode("VEX.128.66.0F 38.WIG 17 /r").0,
            "VEX.128.66.0F38.WIG 17 /r"
        );
        assert_eq!(fix_opcode("0F C7 /1").1, false);
    }

    #[test]
    fn instruction_repairs() {
        assert_eq!(fix_instruction("LAR r32, reg/m16").0, "LAR r32, r32/m16");
        assert_eq!(fix_instruction("SHL r/m8, cl").0, "SHL r/m8, CL");
        assert_eq!(fix_instruction("MOVBE r16, m16*").0, "MOVBE r16, m16");
    }

    #[test]
    fn cpuid_spelling() {
        assert_eq!(fix_cpuid("Both AES and AVX flags").0, "AES AVX");
        assert_eq!(fix_cpuid("HLE or RTM").0, "HLE RTM");
        assert_eq!(fix_cpuid("AVX2").0, "AVX2");
    }

    #[test]
    fn mode_columns() {
        assert_eq!(mode_validity("V"), Some(true));
        assert_eq!(mode_validity("Valid*"), Some(true));
        assert_eq!(mode_validity("N.E."), Some(false));
        assert_eq!(mode_validity("N.P."), Some(false));
        assert_eq!(mode_validity("banana"), None);
    }

    #[test]
    fn manual_error_lookup() {
        let fix = manual_error("XBEGIN rel16", "C7 F8 C7 F8").unwrap();
        assert_eq!(fix.fixed_opcode, Some("C7 F8"));
        assert!(manual_error("MOV r32, r/m32", "8B /r").is_none());
    }
}
