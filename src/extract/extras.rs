//! Instructions injected after the manual pass: AMD-V, SMX and VMX
//! system instructions the manual does not list, plus the CMPxx
//! pseudo-instructions that name a fixed comparison predicate.

use super::specs::{MnemonicRow, OpEnRow};
use crate::instruction::TupleType;

struct Extra {
    opcode: &'static str,
    instruction: &'static str,
    /// Op/En cells, aligned with the instruction's operands.
    openc: &'static [&'static str],
    mode64: bool,
    mode32: bool,
    cpuid: &'static str,
}

#[rustfmt::skip]
const EXTRAS: &[Extra] = &[
    // AMD-V. The rAX-addressed instructions mean different things by
    // mode, so each mode gets its own form.
    Extra { opcode: "0F 01 D8", instruction: "VMRUN <EAX>",  openc: &[], mode64: false, mode32: true,  cpuid: "SVM" },
    Extra { opcode: "0F 01 D8", instruction: "VMRUN <RAX>",  openc: &[], mode64: true,  mode32: false, cpuid: "SVM" },
    Extra { opcode: "0F 01 DA", instruction: "VMLOAD <EAX>", openc: &[], mode64: false, mode32: true,  cpuid: "SVM" },
    Extra { opcode: "0F 01 DA", instruction: "VMLOAD <RAX>", openc: &[], mode64: true,  mode32: false, cpuid: "SVM" },
    Extra { opcode: "0F 01 DB", instruction: "VMSAVE <EAX>", openc: &[], mode64: false, mode32: true,  cpuid: "SVM" },
    Extra { opcode: "0F 01 DB", instruction: "VMSAVE <RAX>", openc: &[], mode64: true,  mode32: false, cpuid: "SVM" },
    Extra { opcode: "0F 01 D9", instruction: "VMMCALL",      openc: &[], mode64: true,  mode32: true,  cpuid: "SVM" },
    Extra { opcode: "0F 01 DC", instruction: "STGI",         openc: &[], mode64: true,  mode32: true,  cpuid: "SVM" },
    Extra { opcode: "0F 01 DD", instruction: "CLGI",         openc: &[], mode64: true,  mode32: true,  cpuid: "SVM" },
    Extra { opcode: "0F 01 DE", instruction: "SKINIT <EAX>", openc: &[], mode64: true,  mode32: true,  cpuid: "SVM" },
    Extra { opcode: "0F 01 DF", instruction: "INVLPGA <EAX>, <ECX>", openc: &[], mode64: true, mode32: true, cpuid: "SVM" },

    // SMX. The manual only documents the GETSEC leaf functions; the
    // bare instruction is what actually encodes.
    Extra { opcode: "NP 0F 37", instruction: "GETSEC <EAX>", openc: &[], mode64: true, mode32: true, cpuid: "SMX" },

    // VMX.
    Extra { opcode: "0F 01 C1", instruction: "VMCALL",   openc: &[], mode64: true, mode32: true, cpuid: "VMX" },
    Extra { opcode: "0F 01 C2", instruction: "VMLAUNCH", openc: &[], mode64: true, mode32: true, cpuid: "VMX" },
    Extra { opcode: "0F 01 C3", instruction: "VMRESUME", openc: &[], mode64: true, mode32: true, cpuid: "VMX" },
    Extra { opcode: "0F 01 C4", instruction: "VMXOFF",   openc: &[], mode64: true, mode32: true, cpuid: "VMX" },
    Extra { opcode: "F3 0F C7 /6", instruction: "VMXON m64",   openc: &["ModRM:r/m (r)"], mode64: true, mode32: true, cpuid: "VMX" },
    Extra { opcode: "NP 0F C7 /6", instruction: "VMPTRLD m64", openc: &["ModRM:r/m (r)"], mode64: true, mode32: true, cpuid: "VMX" },
    Extra { opcode: "NP 0F C7 /7", instruction: "VMPTRST m64", openc: &["ModRM:r/m (w)"], mode64: true, mode32: true, cpuid: "VMX" },
    Extra { opcode: "66 0F C7 /6", instruction: "VMCLEAR m64", openc: &["ModRM:r/m (w)"], mode64: true, mode32: true, cpuid: "VMX" },
];

/// The SSE comparison predicates, in immediate order.
const PREDICATES: &[&str] = &["eq", "lt", "le", "unord", "neq", "nlt", "nle", "ord"];

/// The CMPxxPS/PD/SS/SD families: (suffix, mandatory prefix, second
/// operand, CPUID flag).
const CMP_FAMILIES: &[(&str, &str, &str, &str)] = &[
    ("PS", "NP", "xmm2/m128", "SSE"),
    ("PD", "66", "xmm2/m128", "SSE2"),
    ("SS", "F3", "xmm2/m32", "SSE"),
    ("SD", "F2", "xmm2/m64", "SSE2"),
];

/// Builds the full list of injected rows.
pub fn extra_rows() -> Vec<(MnemonicRow, Option<OpEnRow>)> {
    let mut rows = Vec::new();

    for extra in EXTRAS {
        let openc = if extra.openc.is_empty() {
            None
        } else {
            Some(OpEnRow {
                id: "X".to_string(),
                tuple: TupleType::None,
                cells: extra.openc.iter().map(|c| c.to_string()).collect(),
            })
        };
        rows.push((
            MnemonicRow {
                page: 0,
                opcode: extra.opcode.to_string(),
                instruction: extra.instruction.to_string(),
                openc: "X".to_string(),
                mode64: extra.mode64,
                mode32: extra.mode32,
                cpuid: extra
                    .cpuid
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
            },
            openc,
        ));
    }

    // The predicate pseudo-instructions carry their comparison selector
    // as an implied trailing immediate.
    for &(suffix, prefix, source, cpuid) in CMP_FAMILIES {
        for (index, predicate) in PREDICATES.iter().enumerate() {
            rows.push((
                MnemonicRow {
                    page: 0,
                    opcode: format!("{} 0F C2 /r {:02X}", prefix, index),
                    instruction: format!(
                        "CMP{}{} xmm1, {}",
                        predicate.to_ascii_uppercase(),
                        suffix,
                        source
                    ),
                    openc: "RM".to_string(),
                    mode64: true,
                    mode32: true,
                    cpuid: vec![cpuid.to_string()],
                },
                Some(OpEnRow {
                    id: "RM".to_string(),
                    tuple: TupleType::None,
                    cells: vec!["ModRM:reg (r, w)".to_string(), "ModRM:r/m (r)".to_string()],
                }),
            ));
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{specs, Options, Stats};

    #[test]
    fn cmp_pseudo_ops_carry_their_predicate() {
        let rows = extra_rows();
        let (row, openc) = rows
            .iter()
            .find(|(row, _)| row.instruction.starts_with("CMPNLEPD"))
            .unwrap();
        let mut stats = Stats::default();
        let forms =
            specs::forms_from_row(row, openc.as_ref(), &Options::default(), &mut stats).unwrap();
        // xmm2/m128 splits.
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[0].encoding.implied_immediate, vec![6]);
        assert_eq!(forms[0].encoding.mandatory_prefixes, vec![0x66]);
    }

    #[test]
    fn vmrun_exists_once_per_mode() {
        let rows = extra_rows();
        let vmruns: Vec<_> = rows
            .iter()
            .filter(|(row, _)| row.instruction.starts_with("VMRUN"))
            .collect();
        assert_eq!(vmruns.len(), 2);
        assert!(vmruns.iter().any(|(r, _)| r.mode64 && !r.mode32));
        assert!(vmruns.iter().any(|(r, _)| !r.mode64 && r.mode32));
    }

    #[test]
    fn every_extra_parses_through_the_pipeline() {
        let mut stats = Stats::default();
        for (row, openc) in extra_rows() {
            let forms = specs::forms_from_row(&row, openc.as_ref(), &Options::default(), &mut stats)
                .unwrap_or_else(|err| panic!("extra `{}`: {}", row.instruction, err));
            assert!(!forms.is_empty());
        }
    }
}
